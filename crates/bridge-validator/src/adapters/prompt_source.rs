//! Prompt source for self-originated rounds.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{json, Value};

use crate::domain::Netuid;
use crate::ports::PromptSource;

/// Payload shape peers expect for a text prompt.
pub fn prompt_payload(prompt: &str, netuid: Netuid) -> Value {
    json!({
        "prompt": prompt,
        "type": "prompt",
        "netuid": netuid,
    })
}

/// Picks uniformly from a configured prompt list.
pub struct StaticPromptSource {
    prompts: Vec<String>,
    netuid: Netuid,
    rng: Mutex<StdRng>,
}

impl StaticPromptSource {
    /// Create a source; an empty list yields no payloads.
    pub fn new(prompts: Vec<String>, netuid: Netuid) -> Self {
        Self {
            prompts,
            netuid,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl PromptSource for StaticPromptSource {
    fn next_payload(&self) -> Option<Value> {
        let mut rng = self.rng.lock();
        self.prompts
            .choose(&mut *rng)
            .map(|prompt| prompt_payload(prompt, self.netuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = prompt_payload("what is 2+2?", 21);
        assert_eq!(payload["type"], "prompt");
        assert_eq!(payload["netuid"], 21);
        assert_eq!(payload["prompt"], "what is 2+2?");
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        assert!(StaticPromptSource::new(vec![], 1).next_payload().is_none());
    }

    #[test]
    fn test_picks_configured_prompt() {
        let source = StaticPromptSource::new(vec!["a".into(), "b".into()], 1);
        for _ in 0..10 {
            let payload = source.next_payload().unwrap();
            assert!(payload["prompt"] == "a" || payload["prompt"] == "b");
        }
    }
}
