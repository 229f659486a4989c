use async_trait::async_trait;
use log::info;

use super::{Backend, Connector, DataApiBackend, Error, MongoBackend};
use crate::{params::Settings, types::BackendKind};

/// Production connector: each backend is reached with the settings read from
/// the environment.
///
/// Mandatory settings of the requested backend are validated before any
/// network call.
#[async_trait]
impl Connector for Settings {
    async fn connect(&self, kind: BackendKind) -> Result<Box<dyn Backend>, Error> {
        info!("setting up `{}` backend", kind);

        let backend: Box<dyn Backend> = match kind {
            BackendKind::Mongodb => Box::new(MongoBackend::connect(&self.mongodb()).await?),
            BackendKind::Hcd => {
                let settings = self.hcd()?;
                Box::new(DataApiBackend::connect_hcd(&settings).await?)
            }
            BackendKind::Astra => {
                let settings = self.astra()?;
                Box::new(DataApiBackend::connect_astra(&settings).await?)
            }
        };

        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ConfigError, env};

    #[tokio::test]
    async fn missing_settings_fail_before_connecting() {
        let settings = Settings::from_lookup(|key| {
            (key == env::ASTRA_DB_ID).then(|| "db".to_owned())
        })
        .unwrap();

        let err = settings.connect(BackendKind::Astra).await.err().unwrap();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingSettings { ref keys, .. })
                if keys == &vec![env::ASTRA_DB_REGION, env::ASTRA_DB_TOKEN]
        ));

        let err = settings.connect(BackendKind::Hcd).await.err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::MissingSettings { .. })));
    }
}
