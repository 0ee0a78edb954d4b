//! Text rewriting invoked after a request is authenticated
//!
//! The engine asks the language model first and falls back to the
//! rule-based rewrite on any failure, so callers always get a string.

mod rules;
mod xai;

use async_trait::async_trait;
use common::{Config, GatewayError, Result};
use log::{debug, error};

pub use rules::RuleRewriter;
pub use xai::{build_prompt, XaiClient, SYSTEM_PROMPT};

#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, text: &str, translate_to_french: bool) -> String;
}

#[async_trait]
impl Rewriter for RuleRewriter {
    async fn rewrite(&self, text: &str, _translate_to_french: bool) -> String {
        RuleRewriter::rewrite(self, text)
    }
}

pub struct RewriteEngine {
    model: Option<XaiClient>,
    rules: RuleRewriter,
}

impl RewriteEngine {
    pub fn new(model: Option<XaiClient>) -> Result<Self> {
        let rules = RuleRewriter::new().map_err(|e| GatewayError::InternalError(e.to_string()))?;
        Ok(Self { model, rules })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(XaiClient::from_config(config)?)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}

#[async_trait]
impl Rewriter for RewriteEngine {
    async fn rewrite(&self, text: &str, translate_to_french: bool) -> String {
        let model = match &self.model {
            Some(model) => model,
            None => {
                debug!("No model configured, using rule-based rewrite");
                return self.rules.rewrite(text);
            }
        };

        match model.generate(text, translate_to_french).await {
            Ok(rewritten) => rewritten,
            Err(e) => {
                error!("Error with AI rewriting: {}", e);
                self.rules.rewrite(text)
            }
        }
    }
}
