//! Boundary of the "describe this function" collaborator.
//!
//! The remote model client lives outside this crate; it only has to implement
//! [`TextGenerator`]. This module owns the prompt and the bounded
//! retry-on-rate-limit policy around it.

use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::config::DescribeConfig;
use crate::log::FileLog;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("Rate limited by the text-generation service")]
    RateLimited,

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Text generation failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescribeError {
    #[error("Still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Describe failed: {0}")]
    Failed(String),

    #[error("Nothing to describe: no code and no docstring")]
    NothingToDescribe,
}

impl From<GenerateError> for DescribeError {
    fn from(e: GenerateError) -> Self {
        match e {
            // Only reached when the retry loop gives up.
            GenerateError::RateLimited => DescribeError::RateLimitExhausted { attempts: 1 },
            GenerateError::MissingCredentials(m) => DescribeError::MissingCredentials(m),
            GenerateError::MalformedResponse(m) => DescribeError::MalformedResponse(m),
            GenerateError::Failed(m) => DescribeError::Failed(m),
        }
    }
}

pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least one is always made.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &DescribeConfig) -> Self {
        Self {
            attempts: cfg.retries,
            delay: Duration::from_secs(cfg.delay_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DescribeConfig::default())
    }
}

pub fn describe_prompt(function_code: &str) -> String {
    format!(
        "# Function code:\n{function_code}\n\n\
         Explain the following, using clear section headings and bullet points where appropriate:\n\n\
         ## Purpose\n- What is the purpose of this function?\n\n\
         ## Parameters\n- List each parameter and its role.\n\n\
         ## Return Value\n- What does it return?\n\n\
         ## Key Logic & Edge Cases\n- Describe key logic, handling of edge cases, and anything non-trivial.\n\n\
         Format your answer for readability by a developer (use markdown-style headings and lists).\n"
    )
}

/// Ask the generator to explain `function_code`, retrying only on rate limits.
pub fn describe_function(
    generator: &dyn TextGenerator,
    function_code: &str,
    policy: &RetryPolicy,
    log: &dyn FileLog,
) -> Result<String, DescribeError> {
    let prompt = describe_prompt(function_code);
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        match generator.generate(&prompt) {
            Ok(text) => return Ok(text.trim().to_string()),
            Err(GenerateError::RateLimited) if attempt < attempts => {
                log.info(&format!(
                    "Rate limit hit. Retrying {attempt}/{attempts} in {:?}",
                    policy.delay
                ));
                thread::sleep(policy.delay);
            }
            Err(GenerateError::RateLimited) => {
                log.error(&format!("Rate limit hit on final attempt {attempt}/{attempts}"));
                return Err(DescribeError::RateLimitExhausted { attempts });
            }
            Err(other) => {
                log.error(&format!("Model call failed (describe_function): {other}"));
                return Err(other.into());
            }
        }
    }
    Err(DescribeError::RateLimitExhausted { attempts })
}

/// Describe a definition from its code, or from its stored docstring when no
/// code was supplied.
pub fn describe_definition(
    generator: &dyn TextGenerator,
    code: Option<&str>,
    docstring: Option<&str>,
    policy: &RetryPolicy,
    log: &dyn FileLog,
) -> Result<String, DescribeError> {
    let fragment = code
        .filter(|c| !c.trim().is_empty())
        .or_else(|| docstring.filter(|d| !d.trim().is_empty()))
        .ok_or(DescribeError::NothingToDescribe)?;
    describe_function(generator, fragment, policy, log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<Result<String, GenerateError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<String, GenerateError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(vec![]),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl TextGenerator for Scripted {
        fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(GenerateError::Failed("script exhausted".into())))
        }
    }

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn retries_rate_limits_then_succeeds() {
        let generator = Scripted::new(vec![
            Err(GenerateError::RateLimited),
            Ok("  ## Purpose\n- adds  \n".into()),
        ]);
        let log = MemoryLog::new();
        let code = "def add(a, b): return a + b";
        let out = describe_function(&generator, code, &fast(3), &log).unwrap();

        assert_eq!(out, "## Purpose\n- adds");
        assert_eq!(generator.calls(), 2);
        assert!(log.lines()[0].contains("Retrying 1/3"));
    }

    #[test]
    fn rate_limit_exhaustion_is_distinct() {
        let generator = Scripted::new(vec![Err(GenerateError::RateLimited); 3]);
        let err = describe_function(&generator, "x", &fast(3), &MemoryLog::new()).unwrap_err();
        assert_eq!(err, DescribeError::RateLimitExhausted { attempts: 3 });
        assert_eq!(generator.calls(), 3);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let generator = Scripted::new(vec![
            Err(GenerateError::MissingCredentials("WATSONX_APIKEY".into())),
            Ok("unused".into()),
        ]);
        let err = describe_function(&generator, "x", &fast(5), &MemoryLog::new()).unwrap_err();
        assert_eq!(err, DescribeError::MissingCredentials("WATSONX_APIKEY".into()));
        assert_eq!(generator.calls(), 1);

        let generator = Scripted::new(vec![Err(GenerateError::MalformedResponse(
            "no results".into(),
        ))]);
        let err = describe_function(&generator, "x", &fast(5), &MemoryLog::new()).unwrap_err();
        assert!(matches!(err, DescribeError::MalformedResponse(_)));
    }

    #[test]
    fn definition_falls_back_to_docstring() {
        let generator = Scripted::new(vec![Ok("described".into())]);
        let out = describe_definition(
            &generator,
            Some("   "),
            Some("Loads the config."),
            &fast(1),
            &MemoryLog::new(),
        )
        .unwrap();
        assert_eq!(out, "described");
        assert!(generator.prompts.lock().unwrap()[0].contains("Loads the config."));

        let err = describe_definition(&generator, None, None, &fast(1), &MemoryLog::new())
            .unwrap_err();
        assert_eq!(err, DescribeError::NothingToDescribe);
    }
}
