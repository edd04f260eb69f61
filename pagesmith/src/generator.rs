//! Content generation.
//!
//! The pipeline only sees [`ContentGenerator`]. [`LlmGenerator`] is the
//! production implementation: one LLM call for the entry point, then README,
//! LICENSE and decoded attachments appended in that order.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::GenerationError;
use crate::llm::Completion;
use crate::model::{ArtifactBundle, Attachment, ENTRY_POINT, check_file_path};
use crate::scaffold;

/// Standard alphabet, padding optional.
const DATA_URI_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Turns a brief into a bundle of named files.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(
        &self,
        brief: &str,
        attachments: &[Attachment],
        checks: &[String],
    ) -> Result<ArtifactBundle, GenerationError>;
}

const SYSTEM_PROMPT: &str = r#"You are a front-end engineer who ships single-file web apps.

Rules:
- Reply with ONE complete HTML document and nothing else. No commentary.
- Inline all CSS and JavaScript. CDN <script> and <link> tags are allowed.
- The page must work when served as static files from GitHub Pages.
- Attachments named in the request are served next to index.html; reference them by file name.
- Satisfy every numbered check exactly; they are verified automatically.
- Include a descriptive <title>."#;

/// Generator backed by an LLM completion.
pub struct LlmGenerator {
    llm: Arc<dyn Completion>,
    license_holder: String,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn Completion>, license_holder: impl Into<String>) -> Self {
        Self {
            llm,
            license_holder: license_holder.into(),
        }
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate(
        &self,
        brief: &str,
        attachments: &[Attachment],
        checks: &[String],
    ) -> Result<ArtifactBundle, GenerationError> {
        let prompt = build_prompt(brief, attachments, checks);
        let raw = self
            .llm
            .complete(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| GenerationError::Service(format!("{e:#}")))?;

        let html = strip_code_fences(&raw);
        if html.trim().is_empty() {
            return Err(GenerationError::EmptyContent);
        }

        let title = html_title(&html).unwrap_or_else(|| "Generated App".to_string());

        let mut bundle = ArtifactBundle::new();
        bundle.insert(ENTRY_POINT, html);
        bundle.insert("README.md", scaffold::readme(&title, brief, checks));
        bundle.insert("LICENSE", scaffold::mit_license(&self.license_holder));

        let mut attached: Vec<&str> = Vec::new();
        for attachment in attachments {
            check_file_path(&attachment.name).map_err(|reason| GenerationError::Attachment {
                name: attachment.name.clone(),
                reason,
            })?;
            if attached.contains(&attachment.name.as_str()) {
                tracing::warn!(name = %attachment.name, "Duplicate attachment name, keeping the first");
                continue;
            }
            if bundle.contains(&attachment.name) {
                tracing::warn!(name = %attachment.name, "Attachment shadows a generated file, skipping");
                continue;
            }
            let bytes = decode_data_uri(&attachment.url).map_err(|reason| {
                GenerationError::Attachment {
                    name: attachment.name.clone(),
                    reason,
                }
            })?;
            bundle.insert(attachment.name.clone(), bytes);
            attached.push(&attachment.name);
        }

        bundle.validate().map_err(GenerationError::InvalidBundle)?;
        Ok(bundle)
    }
}

fn build_prompt(brief: &str, attachments: &[Attachment], checks: &[String]) -> String {
    let mut prompt = format!("Build this app:\n\n{}\n", brief.trim());

    if !checks.is_empty() {
        prompt.push_str("\nChecks the app must pass:\n");
        for (i, check) in checks.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, check));
        }
    }

    if !attachments.is_empty() {
        prompt.push_str("\nAttached files (available next to index.html):\n");
        for attachment in attachments {
            prompt.push_str(&format!("- {}\n", attachment.name));
        }
    }

    prompt
}

/// Remove a surrounding Markdown fence (```html ... ```) if the model added one.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. "html") on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => "",
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let start = lower.find("<title>")? + "<title>".len();
    let end = start + lower[start..].find("</title>")?;
    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Decode a `data:[<mediatype>][;base64],<payload>` URI. Base64 payloads may
/// be line-wrapped, percent-escaped or unpadded.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "not a data: URI".to_string())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data: URI has no payload separator".to_string())?;

    if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        let compact: Vec<u8> = percent_encoding::percent_decode_str(payload)
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        DATA_URI_BASE64
            .decode(compact)
            .map_err(|e| format!("invalid base64: {e}"))
    } else {
        Ok(percent_encoding::percent_decode_str(payload).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedCompletion {
        reply: anyhow::Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedCompletion {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Completion for CannedCompletion {
        async fn complete(&self, _system: &str, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn checks() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn strips_fences_with_and_without_info_string() {
        assert_eq!(strip_code_fences("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_code_fences("```\n<p>x</p>\n```\n"), "<p>x</p>");
        assert_eq!(strip_code_fences("  <p>x</p>  "), "<p>x</p>");
        assert_eq!(strip_code_fences("```html\n```"), "");
    }

    #[test]
    fn decodes_base64_and_plain_data_uris() {
        assert_eq!(decode_data_uri("data:text/plain;base64,aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_data_uri("data:text/csv,a%2Cb%0A1%2C2").unwrap(), b"a,b\n1,2");
        assert!(decode_data_uri("https://example.com/x.png").is_err());
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn base64_payload_may_be_wrapped_or_unpadded() {
        assert_eq!(decode_data_uri("data:text/plain;base64,aGVs\nbG8=").unwrap(), b"hello");
        assert_eq!(decode_data_uri("data:text/plain;base64,aGVs\r\n bG8=\n").unwrap(), b"hello");
        assert_eq!(decode_data_uri("data:text/plain;base64,aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_data_uri("data:text/plain;base64,aGVsbG8%3D").unwrap(), b"hello");
    }

    #[test]
    fn finds_title_case_insensitively() {
        assert_eq!(
            html_title("<html><TITLE> Counter </TITLE></html>"),
            Some("Counter".to_string())
        );
        assert_eq!(html_title("<html></html>"), None);
    }

    #[tokio::test]
    async fn bundle_has_entry_readme_license_then_attachments() {
        let llm = CannedCompletion::ok("```html\n<html><title>Counter</title></html>\n```");
        let generator = LlmGenerator::new(llm.clone(), "Acme");
        let attachments = vec![Attachment {
            name: "data.csv".to_string(),
            url: "data:text/csv;base64,eCx5CjEsMg==".to_string(),
        }];

        let bundle = generator
            .generate("Build a counter", &attachments, &checks())
            .await
            .unwrap();

        let paths: Vec<&str> = bundle.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["index.html", "README.md", "LICENSE", "data.csv"]);
        assert_eq!(
            bundle.get("index.html"),
            Some(b"<html><title>Counter</title></html>".as_slice())
        );
        let readme = String::from_utf8(bundle.get("README.md").unwrap().to_vec()).unwrap();
        assert!(readme.starts_with("# Counter"));
        assert!(readme.contains("1. a\n2. b\n"));
        assert_eq!(bundle.get("data.csv"), Some(b"x,y\n1,2".as_slice()));

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("1. a\n2. b\n"));
        assert!(prompts[0].contains("- data.csv"));
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let generator = LlmGenerator::new(CannedCompletion::ok("```html\n```"), "Acme");
        let err = generator.generate("brief", &[], &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyContent));
    }

    #[tokio::test]
    async fn service_failure_is_reported() {
        let llm = Arc::new(CannedCompletion {
            reply: Err(anyhow::anyhow!("rate limited")),
            prompts: Mutex::new(Vec::new()),
        });
        let generator = LlmGenerator::new(llm, "Acme");
        let err = generator.generate("brief", &[], &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::Service(ref m) if m.contains("rate limited")));
    }

    #[tokio::test]
    async fn attachment_colliding_with_generated_file_is_skipped() {
        let generator = LlmGenerator::new(CannedCompletion::ok("<html></html>"), "Acme");
        let attachments = vec![Attachment {
            name: "LICENSE".to_string(),
            url: "data:,nope".to_string(),
        }];
        let bundle = generator.generate("brief", &attachments, &[]).await.unwrap();
        assert_eq!(bundle.len(), 3);
        assert!(bundle.get("LICENSE").unwrap().starts_with(b"MIT License"));
    }

    #[tokio::test]
    async fn duplicate_attachment_keeps_the_first() {
        let generator = LlmGenerator::new(CannedCompletion::ok("<html></html>"), "Acme");
        let attachments = vec![
            Attachment {
                name: "data.csv".to_string(),
                url: "data:,first".to_string(),
            },
            Attachment {
                name: "data.csv".to_string(),
                url: "data:,second".to_string(),
            },
        ];
        let bundle = generator.generate("brief", &attachments, &[]).await.unwrap();
        assert_eq!(bundle.len(), 4);
        assert_eq!(bundle.get("data.csv"), Some(b"first".as_slice()));
    }

    #[tokio::test]
    async fn attachment_name_escaping_the_repository_fails_generation() {
        let generator = LlmGenerator::new(CannedCompletion::ok("<html></html>"), "Acme");
        let attachments = vec![Attachment {
            name: "../../r2/collaborators/mallory".to_string(),
            url: "data:,x".to_string(),
        }];
        let err = generator.generate("brief", &attachments, &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::Attachment { ref name, .. } if name.starts_with("../")));
    }

    #[tokio::test]
    async fn bad_attachment_fails_generation() {
        let generator = LlmGenerator::new(CannedCompletion::ok("<html></html>"), "Acme");
        let attachments = vec![Attachment {
            name: "img.png".to_string(),
            url: "data:image/png;base64,%%%".to_string(),
        }];
        let err = generator.generate("brief", &attachments, &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::Attachment { ref name, .. } if name == "img.png"));
    }
}
