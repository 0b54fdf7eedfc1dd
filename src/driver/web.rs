//! Web driver for the provider portal, on Playwright.
//!
//! A UI step arrives as one `UiSequence`; its commands run in order against a
//! single page and the first failing command aborts the sequence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::traits::{
    ActionRequest, PlatformDriver, RawOutcome, Selector, SlotCalendar, SlotView, UiCommand,
    UiSequence,
};
use crate::runner::slot_search::find_first_slot;
use crate::utils::RunConfig;

/// Enabled, visible day buttons of the MUI date picker.
const DAY_CELLS: &str = "button.MuiPickersDay-root:not(.Mui-disabled):not(.MuiPickersDay-hidden)";
const MONTH_LABEL: &str = ".MuiPickersCalendarHeader-label";
const NEXT_MONTH: &str = "button[aria-label=\"Next month\"]";
const PREVIOUS_MONTH: &str = "button[aria-label=\"Previous month\"]";
const NO_SLOTS: &str = "text=No Slots Available";
const TIME_SLOTS: &str =
    "[data-testid=\"time-slot\"], .time-slot, button:has-text(\"AM\"), button:has-text(\"PM\")";

pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    #[allow(dead_code)]
    browser: Arc<Browser>,
    #[allow(dead_code)]
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    app_url: String,
    element_timeout_ms: u64,
    slot_settle_ms: u64,
    output_dir: PathBuf,
}

impl WebDriver {
    pub async fn new(config: &RunConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;
        playwright
            .prepare()
            .context("Failed to install Playwright browsers")?;

        let browser = playwright
            .chromium()
            .launcher()
            .headless(config.headless)
            .args(&[
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--ignore-certificate-errors".to_string(),
            ])
            .launch()
            .await
            .context("Failed to launch Chromium")?;

        let context = browser.context_builder().build().await?;
        let page = context.new_page().await?;
        page.set_viewport_size(Viewport {
            width: 1280,
            height: 720,
        })
        .await?;

        info!(
            "Browser ready (headless: {}) for {}",
            config.headless, config.app_url
        );

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            app_url: config.app_url.trim_end_matches('/').to_string(),
            element_timeout_ms: config.timeouts.element_ms,
            slot_settle_ms: config.timeouts.slot_settle_ms,
            output_dir: config.output_dir.clone(),
        })
    }

    fn full_url(&self, url: &str) -> String {
        join_url(&self.app_url, url)
    }

    fn calendar(&self) -> PageCalendar {
        PageCalendar {
            page: self.page.clone(),
            settle_ms: self.slot_settle_ms,
            shown_month: std::sync::Mutex::new(None),
        }
    }

    async fn run_sequence(&self, seq: &UiSequence) -> Result<RawOutcome> {
        let mut body = json!({ "sequence": seq.label, "commands": seq.commands.len() });

        for (i, command) in seq.commands.iter().enumerate() {
            debug!("[{}] command {}: {:?}", seq.label, i + 1, command);
            if let Some(extra) = self
                .run_command(command)
                .await
                .with_context(|| format!("{}: command {} ({})", seq.label, i + 1, describe(command)))?
            {
                if let (Some(obj), Value::Object(more)) = (body.as_object_mut(), extra) {
                    obj.extend(more);
                }
            }
        }

        Ok(RawOutcome::ui(body))
    }

    /// Runs one command. Some commands report data back into the outcome body.
    async fn run_command(&self, command: &UiCommand) -> Result<Option<Value>> {
        match command {
            UiCommand::Goto(url) => {
                let page = self.page.lock().await;
                page.goto_builder(&self.full_url(url))
                    .goto()
                    .await
                    .context("Failed to navigate to URL")?;
            }
            UiCommand::Click(selector) => {
                let page = self.page.lock().await;
                let sel = selector_to_playwright(selector);
                page.click_builder(&sel)
                    .timeout(self.element_timeout_ms as f64)
                    .click()
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to click: {}. Error: {:?}", sel, e))?;
            }
            UiCommand::Fill(selector, value) => {
                let page = self.page.lock().await;
                let sel = selector_to_playwright(selector);
                page.fill_builder(&sel, value)
                    .timeout(self.element_timeout_ms as f64)
                    .fill()
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to fill: {}. Error: {:?}", sel, e))?;
            }
            UiCommand::Press(selector, key) => {
                let page = self.page.lock().await;
                let sel = selector_to_playwright(selector);
                page.click_builder(&sel)
                    .timeout(self.element_timeout_ms as f64)
                    .click()
                    .await?;
                page.keyboard.down(key).await?;
                page.keyboard.up(key).await?;
            }
            UiCommand::WaitFor(selector, timeout_ms) => {
                let timeout = if *timeout_ms == 0 {
                    self.element_timeout_ms
                } else {
                    *timeout_ms
                };
                let page = self.page.lock().await;
                let sel = selector_to_playwright(selector);
                page.wait_for_selector_builder(&sel)
                    .timeout(timeout as f64)
                    .wait_for_selector()
                    .await
                    .map_err(|_| anyhow::anyhow!("Timed out after {}ms waiting for {}", timeout, sel))?;
            }
            UiCommand::ExpectVisible(selector) => {
                let page = self.page.lock().await;
                let sel = selector_to_playwright(selector);
                let element = page
                    .wait_for_selector_builder(&sel)
                    .timeout(self.element_timeout_ms as f64)
                    .wait_for_selector()
                    .await
                    .ok()
                    .flatten();
                let visible = match element {
                    Some(el) => el.is_visible().await?,
                    None => false,
                };
                if !visible {
                    anyhow::bail!("Expected {} to be visible", selector);
                }
            }
            UiCommand::Pause(ms) => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*ms)).await;
            }
            UiCommand::Screenshot(name) => {
                let path = self.output_dir.join(name);
                self.screenshot(&path).await?;
                return Ok(Some(json!({ "screenshot": path.display().to_string() })));
            }
            UiCommand::PickSlot { from, max_attempts } => {
                let selection = find_first_slot(&self.calendar(), *from, *max_attempts).await?;
                return Ok(Some(json!({
                    "slot": {
                        "date": selection.date.to_string(),
                        "index": selection.index,
                        "available": selection.available,
                        "attempt": selection.attempt,
                    }
                })));
            }
        }
        Ok(None)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let page = self.page.lock().await;
        page.screenshot_builder()
            .path(path.to_path_buf())
            .screenshot()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformDriver for WebDriver {
    fn platform_name(&self) -> &str {
        "web"
    }

    async fn perform(&self, request: &ActionRequest) -> Result<RawOutcome> {
        match request {
            ActionRequest::Ui(seq) => self.run_sequence(seq).await,
            ActionRequest::Api(req) => {
                anyhow::bail!("Web driver cannot send {} {}", req.method, req.path)
            }
        }
    }

    async fn capture_failure(&self, label: &str) -> Result<Option<String>> {
        let path = self
            .output_dir
            .join("screenshots")
            .join(format!("{}_failure.png", sanitize(label)));
        self.screenshot(&path).await?;
        Ok(Some(path.display().to_string()))
    }
}

/// The appointment calendar of the open booking form.
pub struct PageCalendar {
    page: Arc<Mutex<Page>>,
    settle_ms: u64,
    /// Month the picker was last moved to, as (year, month)
    shown_month: std::sync::Mutex<Option<(i32, u32)>>,
}

impl PageCalendar {
    fn last_shown(&self) -> Option<(i32, u32)> {
        self.shown_month.lock().ok().and_then(|m| *m)
    }

    fn set_shown(&self, month: (i32, u32)) {
        if let Ok(mut shown) = self.shown_month.lock() {
            *shown = Some(month);
        }
    }

    /// Page the picker until `date`'s month is on screen.
    async fn show_month(&self, page: &Page, date: NaiveDate) -> Result<()> {
        let label = match page.query_selector(MONTH_LABEL).await? {
            Some(el) => parse_month_label(&el.inner_text().await?),
            None => None,
        };
        let shown = match label.or_else(|| self.last_shown()) {
            Some(shown) => shown,
            None => {
                self.set_shown((date.year(), date.month()));
                return Ok(());
            }
        };

        let offset = month_offset(shown, date);
        let control = if offset > 0 { NEXT_MONTH } else { PREVIOUS_MONTH };
        for _ in 0..offset.unsigned_abs() {
            page.click_builder(control)
                .click()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to change calendar month: {:?}", e))?;
            tokio::time::sleep(tokio::time::Duration::from_millis(self.settle_ms / 4)).await;
        }
        if offset != 0 {
            debug!("Calendar moved {} month(s) to {}-{:02}", offset, date.year(), date.month());
        }
        self.set_shown((date.year(), date.month()));
        Ok(())
    }
}

#[async_trait]
impl SlotCalendar for PageCalendar {
    async fn open_date(&self, date: NaiveDate) -> Result<SlotView> {
        let day = date.day().to_string();
        let page = self.page.lock().await;
        self.show_month(&page, date).await?;

        let mut cell = None;
        for el in page.query_selector_all(DAY_CELLS).await? {
            if el.inner_text().await?.trim() == day {
                cell = Some(el);
                break;
            }
        }
        let cell = cell.ok_or_else(|| anyhow::anyhow!("Date {} not found or not clickable", day))?;
        cell.click_builder().click().await?;
        debug!("Clicked on date: {}", date);

        tokio::time::sleep(tokio::time::Duration::from_millis(self.settle_ms)).await;

        if page.query_selector(NO_SLOTS).await?.is_some() {
            return Ok(SlotView::NoSlots);
        }
        let slots = page.query_selector_all(TIME_SLOTS).await?;
        Ok(SlotView::Slots(slots.len()))
    }

    async fn select_slot(&self, date: NaiveDate, index: usize) -> Result<()> {
        let page = self.page.lock().await;
        let slots = page.query_selector_all(TIME_SLOTS).await?;
        match slots.get(index) {
            Some(slot) => {
                slot.click_builder().click().await?;
                Ok(())
            }
            None => anyhow::bail!("Slot {} on {} disappeared before selection", index, date),
        }
    }
}

/// Convert a `Selector` to a Playwright selector string.
pub fn selector_to_playwright(selector: &Selector) -> String {
    match selector {
        Selector::Css(css) => css.clone(),
        Selector::Text(text) => format!("text=\"{}\"", text),
        Selector::Placeholder(p) => format!("[placeholder=\"{}\"]", p),
        Selector::Role { role, name } => {
            let base = role_css(role);
            format!(
                "{base}[aria-label=\"{name}\"], {base}:has-text(\"{name}\")",
                base = base,
                name = name
            )
        }
    }
}

/// Elements that carry an ARIA role either explicitly or natively.
fn role_css(role: &str) -> String {
    let native = match role {
        "button" => Some("button"),
        "link" => Some("a"),
        "textbox" => Some("input:not([type]), input[type=\"text\"], textarea"),
        "checkbox" => Some("input[type=\"checkbox\"]"),
        "option" => Some("li"),
        _ => None,
    };
    match native {
        Some(tags) => format!(":is([role=\"{}\"], {})", role, tags),
        None => format!("[role=\"{}\"]", role),
    }
}

/// "July 2025" as shown in the picker header.
fn parse_month_label(label: &str) -> Option<(i32, u32)> {
    NaiveDate::parse_from_str(&format!("1 {}", label.trim()), "%d %B %Y")
        .ok()
        .map(|d| (d.year(), d.month()))
}

/// Months to page forward (negative: back) from `shown` to reach `target`.
fn month_offset(shown: (i32, u32), target: NaiveDate) -> i32 {
    (target.year() - shown.0) * 12 + target.month() as i32 - shown.1 as i32
}

fn join_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}/{}", base, url.trim_start_matches('/'))
    }
}

fn describe(command: &UiCommand) -> String {
    match command {
        UiCommand::Goto(url) => format!("goto {}", url),
        UiCommand::Click(s) => format!("click {}", s),
        UiCommand::Fill(s, _) => format!("fill {}", s),
        UiCommand::Press(s, key) => format!("press {} on {}", key, s),
        UiCommand::WaitFor(s, _) => format!("wait for {}", s),
        UiCommand::ExpectVisible(s) => format!("expect {} visible", s),
        UiCommand::Pause(ms) => format!("pause {}ms", ms),
        UiCommand::Screenshot(name) => format!("screenshot {}", name),
        UiCommand::PickSlot { from, .. } => format!("pick slot from {}", from),
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
