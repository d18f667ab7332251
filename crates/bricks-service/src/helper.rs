//! The object vended by the service.

use bricks_protocol::{HelperProtocol, Reply};

/// Stateless implementation of [`HelperProtocol`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BricksHelper;

impl HelperProtocol for BricksHelper {
    fn upper_case_string(&self, input: String, reply: Reply<String>) {
        // Unicode default case mapping; may change the byte length.
        reply.send(input.to_uppercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn call(input: &str) -> String {
        let (reply, pending) = Reply::channel();
        BricksHelper.upper_case_string(input.to_string(), reply);
        pending.await.unwrap()
    }

    #[tokio::test]
    async fn test_examples() {
        assert_eq!(call("hello").await, "HELLO");
        assert_eq!(call("").await, "");
        assert_eq!(call("Hello World 123!").await, "HELLO WORLD 123!");
        assert_eq!(call("ABC").await, "ABC");
    }

    #[tokio::test]
    async fn test_non_ascii() {
        assert_eq!(call("straße").await, "STRASSE");
        assert_eq!(call("привет").await, "ПРИВЕТ");
        assert_eq!(call("日本語").await, "日本語");
    }

    #[tokio::test]
    async fn test_idempotent() {
        for input in ["hello", "Grüße, Jürgen", "mIxEd 42"] {
            let once = call(input).await;
            assert_eq!(call(&once).await, once);
        }
    }
}
