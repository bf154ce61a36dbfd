//! Visual challenge loop raced against the generation-request interceptor.
//!
//! The loop never wins on its own: solving a challenge only makes the page
//! fire its generation request, which the interceptor then captures and
//! aborts. Termination is therefore implicit — the loop runs until the
//! engine raises the cancellation flag and tears the page down, and any
//! error it sees after that point is a benign race loss.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::browser::engine;
use crate::captcha::{CaptchaSolution, CaptchaSolver};
use crate::config::{CaptchaSettings, Settings};
use crate::error::{Error, Result};

/// Intermediate pointer positions per drag, so the piece follows a path
/// instead of teleporting.
const DRAG_STEPS: u32 = 30;

/// On-page challenge widget: its viewport-relative bounding box plus
/// whatever prompt text is reachable from the outer document.
#[derive(Debug, Clone, Deserialize)]
struct ChallengeRegion {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[serde(default)]
    prompt: String,
}

impl ChallengeRegion {
    fn is_drag(&self) -> bool {
        self.prompt.to_lowercase().contains("drag")
    }
}

pub(crate) struct ChallengeLoop<'a> {
    page: &'a Page,
    solver: Arc<dyn CaptchaSolver>,
    settings: &'a Settings,
    cancelled: Arc<AtomicBool>,
}

impl<'a> ChallengeLoop<'a> {
    pub(crate) fn new(
        page: &'a Page,
        solver: Arc<dyn CaptchaSolver>,
        settings: &'a Settings,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            page,
            solver,
            settings,
            cancelled,
        }
    }

    /// Run until cancelled. `Ok(())` means the cancellation flag was
    /// observed; errors raised after the flag went up are swallowed, the
    /// rest propagate for the engine's transient classification.
    pub(crate) async fn run(&self) -> Result<()> {
        loop {
            if self.is_cancelled() {
                return Ok(());
            }
            if let Err(err) = self.step().await {
                if self.is_cancelled() {
                    debug!(error = %err, "ignoring challenge error after cancellation");
                    return Ok(());
                }
                return Err(err);
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn step(&self) -> Result<()> {
        let Some(region) = self.locate_challenge().await? else {
            tokio::time::sleep(Duration::from_millis(500)).await;
            return Ok(());
        };

        // Challenge images render lazily; an early screenshot captures
        // placeholders the solver cannot work with.
        sleep_secs(self.settings.timeouts.captcha_image_load_delay).await;

        let drag = region.is_drag();
        debug!(drag, width = region.width, height = region.height, "challenge detected");

        let solution = self.solve(&region, drag).await?;
        if self.is_cancelled() {
            return Ok(());
        }

        if drag {
            self.act_drag(&region, &solution).await?;
        } else {
            self.act_clicks(&region, &solution).await?;
        }

        self.submit().await
    }

    async fn locate_challenge(&self) -> Result<Option<ChallengeRegion>> {
        const LOCATE_JS: &str = r#"(function() {
  const frame = document.querySelector(
    'iframe[src*="hcaptcha"][src*="frame=challenge"], iframe[src*="captcha"][title*="challenge"]');
  const node = frame
    || document.querySelector('div[class*="challenge-container"], div[class*="captcha"]');
  if (!node) return null;
  const rect = node.getBoundingClientRect();
  if (rect.width < 10 || rect.height < 10) return null;
  let prompt = '';
  const promptNode = document.querySelector('.prompt-text, [class*="prompt-text"]');
  if (promptNode) prompt = promptNode.innerText || '';
  if (!prompt && frame) prompt = frame.getAttribute('title') || '';
  return { x: rect.x, y: rect.y, width: rect.width, height: rect.height, prompt };
})()"#;

        self.page
            .evaluate(LOCATE_JS)
            .await
            .map_err(|err| Error::browser(err.to_string()))?
            .into_value::<Option<ChallengeRegion>>()
            .map_err(|err| Error::browser(err.to_string()))
    }

    /// Screenshot the region and ask the solver for coordinates. Drag
    /// solutions with an unpaired coordinate count are reported back and
    /// re-solved on the same screenshot, without re-waiting for images.
    async fn solve(&self, region: &ChallengeRegion, drag: bool) -> Result<CaptchaSolution> {
        let image = self.screenshot_region(region).await?;
        let (instructions, instruction_image) = if drag {
            (
                Some(self.settings.captcha.drag_instructions.as_str()),
                Some(drag_instruction_image(&self.settings.captcha)?),
            )
        } else {
            (None, None)
        };

        let mut last_err = None;
        for attempt in 1..=self.settings.captcha.solve_retries.max(1) {
            match self
                .solver
                .coordinates(&image, instructions, instruction_image)
                .await
            {
                Ok(solution) => {
                    if drag && !solution.validate_drag() {
                        warn!(
                            id = %solution.id,
                            points = solution.points.len(),
                            "drag solution has unpaired coordinates, reporting"
                        );
                        let _ = self.solver.report_bad(&solution.id).await;
                        last_err = Some(Error::captcha("drag solution with unpaired coordinates"));
                        continue;
                    }
                    return Ok(solution);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "coordinate solve failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::captcha("coordinate solving produced no solution")))
    }

    async fn screenshot_region(&self, region: &ChallengeRegion) -> Result<String> {
        let clip = Viewport {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            scale: 1.0,
        };
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(clip)
            .build();
        let png = self
            .page
            .screenshot(params)
            .await
            .map_err(|err| Error::browser(err.to_string()))?;
        Ok(BASE64.encode(png))
    }

    /// Click-type challenges: one click per coordinate, relative to the
    /// challenge bounding box.
    async fn act_clicks(&self, region: &ChallengeRegion, solution: &CaptchaSolution) -> Result<()> {
        for point in &solution.points {
            let x = region.x + point.x;
            let y = region.y + point.y;
            self.mouse(DispatchMouseEventType::MouseMoved, x, y, false)
                .await?;
            self.mouse(DispatchMouseEventType::MousePressed, x, y, true)
                .await?;
            self.mouse(DispatchMouseEventType::MouseReleased, x, y, true)
                .await?;
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        Ok(())
    }

    /// Drag-type challenges: for each (start, end) pair, press, hold until
    /// the piece unlocks, walk the pointer over in steps, release.
    async fn act_drag(&self, region: &ChallengeRegion, solution: &CaptchaSolution) -> Result<()> {
        for (start, end) in solution.drag_pairs() {
            let (sx, sy) = (region.x + start.x, region.y + start.y);
            let (ex, ey) = (region.x + end.x, region.y + end.y);

            self.mouse(DispatchMouseEventType::MouseMoved, sx, sy, false)
                .await?;
            self.mouse(DispatchMouseEventType::MousePressed, sx, sy, true)
                .await?;
            sleep_secs(self.settings.timeouts.captcha_piece_unlock_delay).await;

            for i in 1..=DRAG_STEPS {
                let t = f64::from(i) / f64::from(DRAG_STEPS);
                let x = sx + (ex - sx) * t;
                let y = sy + (ey - sy) * t;
                self.mouse(DispatchMouseEventType::MouseMoved, x, y, true)
                    .await?;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.mouse(DispatchMouseEventType::MouseReleased, ex, ey, true)
                .await?;
        }
        Ok(())
    }

    /// Click the challenge's own submit control, falling back to the
    /// original create trigger when the widget viewport was torn down from
    /// inactivity.
    async fn submit(&self) -> Result<()> {
        const SUBMIT_JS: &str = r#"(function() {
  const want = ['verify', 'submit', 'check', 'next'];
  function tryDoc(doc) {
    const buttons = Array.from(doc.querySelectorAll('button, [role="button"]'));
    for (const btn of buttons) {
      const text = (btn.innerText || btn.getAttribute('aria-label') || '').trim().toLowerCase();
      if (want.some(w => text === w || text.startsWith(w + ' '))) {
        btn.click();
        return true;
      }
    }
    return false;
  }
  if (tryDoc(document)) return true;
  for (const fr of document.querySelectorAll('iframe')) {
    let doc = null;
    try { doc = fr.contentDocument || (fr.contentWindow && fr.contentWindow.document); } catch (_) {}
    if (doc && tryDoc(doc)) return true;
  }
  return false;
})()"#;

        let clicked: bool = self
            .page
            .evaluate(SUBMIT_JS)
            .await
            .map_err(|err| Error::browser(err.to_string()))?
            .into_value()
            .map_err(|err| Error::browser(err.to_string()))?;
        if !clicked {
            debug!("challenge submit control missing, re-clicking the create trigger");
            engine::click_create(self.page).await?;
        }
        Ok(())
    }

    async fn mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
        buttoned: bool,
    ) -> Result<()> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
        if buttoned {
            builder = builder.button(MouseButton::Left).click_count(1);
        }
        let params = builder.build().map_err(Error::browser)?;
        self.page
            .execute(params)
            .await
            .map_err(|err| Error::browser(err.to_string()))?;
        Ok(())
    }
}

/// Drag answers are only usable when the solver sees the reference image
/// next to the text instructions; refuse to submit a text-only drag job.
fn drag_instruction_image(captcha: &CaptchaSettings) -> Result<&str> {
    captcha.drag_instruction_image.as_deref().ok_or_else(|| {
        Error::captcha("drag challenge requires an instruction image, set CAPTCHA_DRAG_IMAGE")
    })
}

async fn sleep_secs(secs: f64) {
    tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_deserializes_from_locator_shape() {
        let raw = r#"{"x":120.5,"y":88.0,"width":400.0,"height":536.0,
            "prompt":"Drag the puzzle piece into place"}"#;
        let region: ChallengeRegion = serde_json::from_str(raw).unwrap();
        assert!(region.is_drag());
        assert_eq!(region.width, 400.0);

        let raw = r#"{"x":0.0,"y":0.0,"width":300.0,"height":300.0}"#;
        let region: ChallengeRegion = serde_json::from_str(raw).unwrap();
        assert!(!region.is_drag());
        assert!(region.prompt.is_empty());
    }

    #[test]
    fn test_drag_solving_requires_instruction_image() {
        let mut captcha = Settings::default().captcha;
        assert!(captcha.drag_instruction_image.is_none());
        let err = drag_instruction_image(&captcha).unwrap_err();
        assert!(err.to_string().contains("CAPTCHA_DRAG_IMAGE"));

        captcha.drag_instruction_image = Some("aW1hZ2U=".to_string());
        assert_eq!(drag_instruction_image(&captcha).unwrap(), "aW1hZ2U=");
    }

    #[test]
    fn test_drag_detection_is_case_insensitive() {
        let region = ChallengeRegion {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            prompt: "DRAG each image to its matching pair".to_string(),
        };
        assert!(region.is_drag());
    }
}
