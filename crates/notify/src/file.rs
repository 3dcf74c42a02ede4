use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};

use crate::{Notifier, NotifyError};

/// Writes the digest to `<dir>/<YYYY-MM-DD>.html` instead of sending it.
#[derive(Debug, Clone)]
pub struct FileNotifier {
    dir: PathBuf,
    date: Option<NaiveDate>,
}

impl FileNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            date: None,
        }
    }

    /// Pin the file date instead of using today's.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn report_path(&self) -> PathBuf {
        let date = self.date.unwrap_or_else(|| Utc::now().date_naive());
        self.dir.join(format!("{}.html", date.format("%Y-%m-%d")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Notifier for FileNotifier {
    async fn deliver(&self, subject: &str, body_html: &str, recipient: &str) -> Result<(), NotifyError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.report_path();
        let document = format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\n<!-- to: {} -->\n<body>{}</body></html>\n",
            subject, recipient, body_html
        );
        tokio::fs::write(&path, document).await?;
        tracing::info!(path = %path.display(), "digest written");
        Ok(())
    }
}
