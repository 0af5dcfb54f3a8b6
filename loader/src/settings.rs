use config::load_config;
use config::shared::LoaderConfig;

/// Loads and validates the loader configuration.
pub fn load_loader_config() -> anyhow::Result<LoaderConfig> {
    let config = load_config::<LoaderConfig>()?;
    config.validate()?;

    Ok(config)
}
