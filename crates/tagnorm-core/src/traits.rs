//! Core traits for pluggable backends.

use async_trait::async_trait;

use crate::Result;

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation.
///
/// The classification oracle sends every stage call through this trait, so
/// any chat-capable service (or a scripted fake in tests) can stand in for
/// the default Ollama backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text with a system instruction and a user message.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;

    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
            Ok(format!("{}|{}", system, prompt))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let backend: Box<dyn GenerationBackend> = Box::new(EchoBackend);
        let out = backend.generate_with_system("sys", "user").await.unwrap();
        assert_eq!(out, "sys|user");
        assert_eq!(backend.model_name(), "echo");
    }

    #[tokio::test]
    async fn test_default_health_check() {
        assert!(EchoBackend.health_check().await.unwrap());
    }
}
