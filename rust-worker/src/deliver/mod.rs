//! Deliverability enhancement pipeline.
//!
//! Pure transforms applied to every message before transmission: header
//! synthesis plus an ordered list of named body stages. Order matters:
//! unsubscribe substitution must run before the compliance floor so a
//! link is never inserted twice.

pub mod content;
pub mod headers;
pub mod unsubscribe;

use chrono::NaiveDate;
use tracing::trace;

use crate::config::Config;

/// Per-message inputs shared by the body stages.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub recipient: String,
    pub unsubscribe_url: String,
    pub site_url: String,
}

/// One named transform in the body pipeline.
pub struct Stage {
    pub name: &'static str,
    transform: fn(&StageContext, String) -> String,
}

impl Stage {
    /// Apply this stage to the previous stage's output.
    pub fn apply(&self, context: &StageContext, body: String) -> String {
        (self.transform)(context, body)
    }
}

/// The fixed body pipeline, in execution order.
///
/// Extensions slot in here; stages always run in list order against the
/// previous stage's output.
pub const STAGES: &[Stage] = &[
    Stage {
        name: "unsubscribe_substitution",
        transform: |cx, body| body.replace("{unsubscribe_link}", &cx.unsubscribe_url),
    },
    Stage {
        name: "spam_trigger_normalization",
        transform: |_, body| content::normalize_spam_triggers(&body),
    },
    Stage {
        name: "html_hygiene",
        transform: |_, body| content::rewrite_generic_anchors(&content::ensure_image_alts(&body)),
    },
    Stage {
        name: "unsubscribe_compliance",
        transform: |cx, body| {
            if content::has_unsubscribe_link(&body) {
                body
            } else {
                content::append_unsubscribe_footer(&body, &cx.unsubscribe_url)
            }
        },
    },
    Stage {
        name: "browser_view",
        transform: |cx, body| content::add_browser_view(&body, &cx.site_url),
    },
];

/// Applies the deliverability pipeline to message bodies and synthesizes
/// default transport headers.
#[derive(Debug, Clone)]
pub struct Enhancer {
    site_name: String,
    site_url: String,
    admin_email: String,
    unsubscribe_secret: String,
}

impl Enhancer {
    pub fn new(
        site_name: impl Into<String>,
        site_url: impl Into<String>,
        admin_email: impl Into<String>,
        unsubscribe_secret: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            site_url: site_url.into(),
            admin_email: admin_email.into(),
            unsubscribe_secret: unsubscribe_secret.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.site_name,
            &config.site_url,
            &config.admin_email,
            &config.unsubscribe_secret,
        )
    }

    /// The unsubscribe URL generated for a recipient.
    pub fn unsubscribe_url_for(&self, recipient: &str) -> String {
        unsubscribe::unsubscribe_url(&self.site_url, &self.unsubscribe_secret, recipient)
    }

    /// Run the body pipeline for one recipient.
    pub fn enhance_body(&self, body: &str, recipient: &str) -> String {
        let context = StageContext {
            recipient: recipient.to_string(),
            unsubscribe_url: self.unsubscribe_url_for(recipient),
            site_url: self.site_url.clone(),
        };

        let mut result = body.to_string();
        for stage in STAGES {
            result = stage.apply(&context, result);
            trace!(stage = stage.name, length = result.len(), "enhance_stage_applied");
        }
        result
    }

    /// Synthesize the default header set for one recipient.
    pub fn headers_for(&self, recipient: &str, date: NaiveDate) -> Vec<(String, String)> {
        headers::synthesize(
            &self.site_name,
            &self.site_url,
            &self.admin_email,
            &self.unsubscribe_url_for(recipient),
            date,
        )
    }
}
