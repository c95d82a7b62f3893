//! ServerChan push delivery
//!
//! One HTTP POST per configured delivery key. Failures are logged and never
//! retried; delivery problems have no effect on report generation.

const BASE_URL: &str = "https://sctapi.ftqq.com";

/// Last characters of a key, safe for logs
///
/// Char-based so arbitrary env input cannot split a UTF-8 boundary.
fn key_tail(key: &str) -> &str {
    match key.char_indices().rev().nth(3) {
        Some((i, _)) => &key[i..],
        None => key,
    }
}

/// Deliver the rendered report to every key
pub async fn push_report(keys: &[String], title: &str, body: &str) {
    if keys.is_empty() {
        log::warn!("no push keys configured, skipping delivery");
        return;
    }

    let client = reqwest::Client::new();

    for key in keys {
        let url = format!("{}/{}.send", BASE_URL, key);
        let result = client
            .post(&url)
            .form(&[("title", title), ("desp", body)])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                log::info!("pushed report to ...{}", key_tail(key));
            }
            Ok(response) => {
                log::error!(
                    "push to ...{} failed: {}",
                    key_tail(key),
                    response.status()
                );
            }
            Err(e) => {
                log::error!("push to ...{} failed: {}", key_tail(key), e);
            }
        }
    }
}
