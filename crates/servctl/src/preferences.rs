use crate::ServerParameters;

/// Read-only source of the parameters the user asked for.
pub trait PreferenceSource: Send + Sync {
    fn server_parameters(&self) -> ServerParameters;

    fn vibrate(&self) -> bool {
        self.server_parameters().vibrate
    }

    fn port(&self) -> u16 {
        self.server_parameters().port
    }
}

impl PreferenceSource for ServerParameters {
    fn server_parameters(&self) -> ServerParameters {
        self.clone()
    }
}
