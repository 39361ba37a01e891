/// Endpoints for one engine instance.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Base URL of the request/response API, e.g. `http://localhost:8080`.
    pub api_base_url: String,
    /// URL of the push endpoint, without the token parameter,
    /// e.g. `ws://localhost:8080/ws`.
    pub push_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            push_url: "ws://localhost:8080/ws".to_string(),
        }
    }
}
