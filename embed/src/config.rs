/// Builder-style connection settings for remote embedder implementations.
#[derive(Debug, Clone, Default)]
pub struct EmbedConfig {
    pub base_url: String,
    pub api_key: String,
    /// Overrides the model's declared output size when non-zero.
    pub dimension: usize,
}

impl EmbedConfig {
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = key.to_string();
        self
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }
}
