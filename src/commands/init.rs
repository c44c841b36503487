use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the home directory and an initial `config.json`.
///
/// # Arguments
/// - `suivi_home` - The directory that will be the home directory, e.g. `$HOME/suivi`
/// - `display` - The dashboard page, when it is not `dashboard/index.html` in the home directory
/// - `script` - The chart script, when it is not `dashboard/charts.js` in the home directory
///
/// # Errors
/// - Returns an error if the home directory cannot be created or is already initialized.
pub async fn init(
    suivi_home: &Path,
    display: Option<&Path>,
    script: Option<&Path>,
) -> Result<Out<()>> {
    let config = Config::create(suivi_home, display, script).await?;
    let mut message = format!(
        "Created {}\n  dashboard page: {}\n  chart script: {}",
        config.config_path().display(),
        config.display_path().display(),
        config.script_path().display()
    );
    if !config.display_path().is_file() || !config.script_path().is_file() {
        message.push_str("\nThe dashboard files do not exist yet, put them there before `suivi run`");
    }
    Ok(message.into())
}
