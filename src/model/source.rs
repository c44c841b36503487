use serde::{Deserialize, Serialize};

/// One of the six tracked data sources. Each has its own sheet, its own canonical categories and
/// its own section in the dashboard.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cm,
    Pa,
    Communes,
    Upr,
    /// Tickets of type 501 and 511.
    #[serde(rename = "501_511")]
    Tickets,
    Rip,
}

serde_plain::derive_display_from_serialize!(Source);
serde_plain::derive_fromstr_from_deserialize!(Source);

/// A canonical category. `key` is what appears in dashboard markers, config prices and snapshot
/// JSON; `label` is for people.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Category {
    key: &'static str,
    label: &'static str,
}

impl Category {
    const fn new(key: &'static str, label: &'static str) -> Self {
        Self { key, label }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

// The order of each list is the order of the chart arrays in the dashboard script. The last entry
// is the fallback for labels no rule recognizes.

const CM: &[Category] = &[
    Category::new("RAF", "Rien à faire"),
    Category::new("MODIF", "Modification voie"),
    Category::new("CREA", "Création voie"),
    Category::new("AUTRE", "Autre"),
];

const PA: &[Category] = &[
    Category::new("AD_RAS_SANS_TEMPS", "AD RAS sans temps"),
    Category::new("AD_RAS_AVEC_TEMPS", "AD RAS avec temps"),
    Category::new("AD_CREA", "AD créée"),
    Category::new("AD_MODIF", "AD modifiée"),
    Category::new("AUTRE", "Autre"),
];

const COMMUNES: &[Category] = &[
    Category::new("TRAITEE", "Traitée"),
    Category::new("PARTIELLE", "Partiellement traitée"),
    Category::new("NON_TRAITEE", "Non traitée"),
    Category::new("AUTRE", "Autre"),
];

const UPR: &[Category] = &[
    Category::new("UPR_OK", "UPR OK"),
    Category::new("UPR_NOK", "UPR NOK"),
    Category::new("OK", "OK"),
    Category::new("NOK", "NOK"),
    Category::new("AUTRE", "Autre"),
];

const TICKETS: &[Category] = &[
    Category::new("TRAITE", "Traité"),
    Category::new("REJETE", "Rejeté"),
    Category::new("SANS_SUITE", "Sans suite"),
    Category::new("AUTRE", "Autre"),
];

const RIP: &[Category] = &[
    Category::new("ADRESSE_ABSENTE", "Adresse absente"),
    Category::new("ADRESSE_ERRONEE", "Adresse erronée"),
    Category::new("DOUBLON", "Doublon"),
    Category::new("HORS_PERIMETRE", "Hors périmètre"),
    Category::new("AUTRE", "Autre"),
];

impl Source {
    /// Every source, in dashboard order.
    pub const ALL: [Source; 6] = [
        Source::Cm,
        Source::Pa,
        Source::Communes,
        Source::Upr,
        Source::Tickets,
        Source::Rip,
    ];

    /// The canonical categories of this source, in chart order.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Source::Cm => CM,
            Source::Pa => PA,
            Source::Communes => COMMUNES,
            Source::Upr => UPR,
            Source::Tickets => TICKETS,
            Source::Rip => RIP,
        }
    }

    /// The category that receives labels no rule recognizes.
    pub fn fallback(self) -> Category {
        let categories = self.categories();
        categories[categories.len() - 1]
    }

    /// Looks up a category of this source by key.
    pub fn category(self, key: &str) -> Option<Category> {
        self.categories().iter().copied().find(|c| c.key == key)
    }

    /// The position of a category in chart order.
    pub fn position(self, key: &str) -> Option<usize> {
        self.categories().iter().position(|c| c.key == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::Cm => "CM",
            Source::Pa => "PA",
            Source::Communes => "Communes",
            Source::Upr => "UPR",
            Source::Tickets => "501/511",
            Source::Rip => "RIP",
        }
    }
}
