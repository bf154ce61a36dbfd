//! 2Captcha coordinate-solving client
//!
//! Speaks the classic `in.php`/`res.php` protocol: submit the screenshot,
//! poll for the answer, parse the `coordinates:x=..,y=..;..` answer string.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::captcha::{CaptchaSolution, CaptchaSolver, Point};
use crate::error::{Error, Result};

const SUBMIT_PATH: &str = "/in.php";
const RESULT_PATH: &str = "/res.php";

/// Coordinate challenges are human-solved and rarely come back in under a
/// few seconds, so the first poll waits.
const FIRST_POLL_DELAY: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const SOLVE_BUDGET: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: u8,
    request: String,
}

/// Client for the 2Captcha coordinates API
#[derive(Debug, Clone)]
pub struct TwoCaptchaClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    first_poll_delay: Duration,
    poll_interval: Duration,
    solve_budget: Duration,
}

impl TwoCaptchaClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("2Captcha API key is not set"));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into(),
            first_poll_delay: FIRST_POLL_DELAY,
            poll_interval: POLL_INTERVAL,
            solve_budget: SOLVE_BUDGET,
        })
    }

    /// Override the polling cadence
    pub fn with_polling(mut self, first_delay: Duration, interval: Duration, budget: Duration) -> Self {
        self.first_poll_delay = first_delay;
        self.poll_interval = interval;
        self.solve_budget = budget;
        self
    }

    async fn submit(
        &self,
        image_b64: &str,
        instructions: Option<&str>,
        instruction_image_b64: Option<&str>,
    ) -> Result<String> {
        let mut form = vec![
            ("key".to_string(), self.api_key.clone()),
            ("method".to_string(), "base64".to_string()),
            ("coordinatescaptcha".to_string(), "1".to_string()),
            ("body".to_string(), image_b64.to_string()),
            ("json".to_string(), "1".to_string()),
        ];
        if let Some(text) = instructions {
            form.push(("textinstructions".to_string(), text.to_string()));
        }
        if let Some(image) = instruction_image_b64 {
            form.push(("imginstructions".to_string(), image.to_string()));
        }

        let response = self
            .http
            .post(format!("{}{}", self.base_url, SUBMIT_PATH))
            .form(&form)
            .send()
            .await?;
        let body: ApiResponse = response.json().await?;
        if body.status != 1 {
            return Err(Error::captcha(format!(
                "challenge submission rejected: {}",
                body.request
            )));
        }
        debug!(task_id = %body.request, "Challenge submitted to solver");
        Ok(body.request)
    }

    async fn poll_result(&self, task_id: &str) -> Result<Vec<Point>> {
        tokio::time::sleep(self.first_poll_delay).await;
        let deadline = std::time::Instant::now() + self.solve_budget;

        loop {
            let response = self
                .http
                .get(format!("{}{}", self.base_url, RESULT_PATH))
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("action", "get"),
                    ("id", task_id),
                    ("json", "1"),
                ])
                .send()
                .await?;
            let body: ApiResponse = response.json().await?;

            if body.status == 1 {
                return parse_coordinates(&body.request);
            }
            if body.request != "CAPCHA_NOT_READY" {
                return Err(Error::captcha(format!(
                    "solver returned error: {}",
                    body.request
                )));
            }
            if std::time::Instant::now() >= deadline {
                return Err(Error::captcha("solver did not answer within the budget"));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl CaptchaSolver for TwoCaptchaClient {
    async fn coordinates(
        &self,
        image_b64: &str,
        instructions: Option<&str>,
        instruction_image_b64: Option<&str>,
    ) -> Result<CaptchaSolution> {
        let task_id = self
            .submit(image_b64, instructions, instruction_image_b64)
            .await?;
        let points = self.poll_result(&task_id).await?;
        debug!(task_id = %task_id, points = points.len(), "Challenge solved");
        Ok(CaptchaSolution {
            id: task_id,
            points,
        })
    }

    async fn report_bad(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, RESULT_PATH))
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "reportbad"),
                ("id", id),
                ("json", "1"),
            ])
            .send()
            .await?;
        let body: ApiResponse = response.json().await?;
        if body.status != 1 {
            // A failed report is not worth failing the whole flow over
            warn!(task_id = %id, answer = %body.request, "Bad-solution report rejected");
        }
        Ok(())
    }
}

/// Parse the classic `coordinates:x=39,y=59;x=252,y=72` answer format.
/// A bare `x=..,y=..` list without the prefix is accepted too.
fn parse_coordinates(answer: &str) -> Result<Vec<Point>> {
    let list = answer.strip_prefix("coordinates:").unwrap_or(answer);
    let mut points = Vec::new();

    for group in list.split(';') {
        let group = group.trim();
        if group.is_empty() {
            continue;
        }
        let mut x = None;
        let mut y = None;
        for part in group.split(',') {
            match part.trim().split_once('=') {
                Some(("x", value)) => x = value.parse::<f64>().ok(),
                Some(("y", value)) => y = value.parse::<f64>().ok(),
                _ => {}
            }
        }
        match (x, y) {
            (Some(x), Some(y)) => points.push(Point { x, y }),
            _ => {
                return Err(Error::captcha(format!(
                    "unparseable coordinate group: {group}"
                )));
            }
        }
    }

    if points.is_empty() {
        return Err(Error::captcha(format!("empty solver answer: {answer}")));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_coordinates_with_prefix() {
        let points = parse_coordinates("coordinates:x=39,y=59;x=252,y=72").unwrap();
        assert_eq!(
            points,
            vec![Point { x: 39.0, y: 59.0 }, Point { x: 252.0, y: 72.0 }]
        );
    }

    #[test]
    fn test_parse_coordinates_bare_list() {
        let points = parse_coordinates("x=1,y=2").unwrap();
        assert_eq!(points, vec![Point { x: 1.0, y: 2.0 }]);
    }

    #[test]
    fn test_parse_coordinates_rejects_garbage() {
        assert!(parse_coordinates("").is_err());
        assert!(parse_coordinates("coordinates:x=1").is_err());
        assert!(parse_coordinates("nonsense").is_err());
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(TwoCaptchaClient::new("", "https://2captcha.com").is_err());
        assert!(TwoCaptchaClient::new("key", "https://2captcha.com").is_ok());
    }

    #[tokio::test]
    async fn test_coordinates_round_trip_against_mock() {
        use wiremock::matchers::{body_string_contains, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/in.php"))
            .and(body_string_contains("coordinatescaptcha"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "status": 1,
                    "request": "7788"
                })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .and(query_param("action", "get"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "status": 1,
                    "request": "coordinates:x=10,y=20;x=30,y=40"
                })),
            )
            .mount(&server)
            .await;

        let client = TwoCaptchaClient::new("key", server.uri())
            .unwrap()
            .with_polling(
                Duration::from_millis(1),
                Duration::from_millis(1),
                Duration::from_secs(1),
            );
        let solution = client
            .coordinates("aW1hZ2U=", Some("click"), None)
            .await
            .unwrap();
        assert_eq!(solution.id, "7788");
        assert_eq!(solution.points.len(), 2);
        assert!(solution.validate_drag());
    }

    #[tokio::test]
    async fn test_solver_error_surfaces() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/in.php"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "status": 0,
                    "request": "ERROR_ZERO_BALANCE"
                })),
            )
            .mount(&server)
            .await;

        let client = TwoCaptchaClient::new("key", server.uri()).unwrap();
        let err = client.coordinates("aW1hZ2U=", None, None).await.unwrap_err();
        assert!(err.to_string().contains("ERROR_ZERO_BALANCE"));
    }
}
