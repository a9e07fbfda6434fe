#[derive(Copy, Clone, Debug)]
pub enum EnvVar {
    LogLevel,
    Device,
}

impl EnvVar {
    pub fn key(&self) -> &'static str {
        match self {
            EnvVar::LogLevel => "SENSORIUM_LOG",
            EnvVar::Device => "SENSORIUM_DEVICE",
        }
    }

    pub fn value(&self) -> String {
        std::env::var(self.key()).unwrap_or_default()
    }

    pub fn is_set(&self) -> bool {
        !self.value().is_empty()
    }
}
