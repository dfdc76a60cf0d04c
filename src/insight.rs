//! Contradiction insight via an external chat capability.
//!
//! The similarity engine only flags *candidates* — pairs similar enough to
//! warrant a contradiction check. Judging whether two statements actually
//! contradict requires reasoning, which this module delegates to whatever
//! chat provider the host supplies. The core never depends on this for its
//! own correctness.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// A chat/completion capability supplied by the host, e.g. an on-device
/// language model. Treated as an opaque `prompt -> text` function.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Verdict on one candidate pair, as reported by the chat provider.
#[derive(Debug, Clone)]
pub struct ContradictionInsight {
    /// True when the provider judged the statements contradictory.
    pub contradicts: bool,
    /// The provider's explanation, verbatim.
    pub explanation: String,
}

/// Ask the chat provider whether two statements contradict each other.
///
/// Provider failures surface as [`Error::Inference`]; callers that only
/// wanted the similarity filter can ignore this helper entirely.
pub async fn explain_contradiction(
    provider: &dyn ChatProvider,
    statement_a: &str,
    statement_b: &str,
) -> Result<ContradictionInsight> {
    let prompt = contradiction_prompt(statement_a, statement_b);
    let reply = provider
        .chat(&prompt)
        .await
        .map_err(|e| Error::Inference(format!("chat provider failed: {e:#}")))?;

    Ok(parse_verdict(&reply))
}

fn contradiction_prompt(a: &str, b: &str) -> String {
    format!(
        "Do these two statements contradict each other?\n\n\
         Statement A: {a}\n\
         Statement B: {b}\n\n\
         Answer with YES or NO on the first line, then a one-sentence \
         explanation."
    )
}

/// First line YES/NO, remainder is the explanation. A malformed reply is
/// treated as non-contradicting with the full reply as explanation.
fn parse_verdict(reply: &str) -> ContradictionInsight {
    let mut lines = reply.trim().lines();
    let first = lines.next().unwrap_or("").trim().to_uppercase();
    let contradicts = first.starts_with("YES");

    let explanation = {
        let rest: String = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        if rest.is_empty() {
            reply.trim().to_string()
        } else {
            rest
        }
    };

    ContradictionInsight {
        contradicts,
        explanation,
    }
}
