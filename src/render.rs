//! Pure projection of panel state into HTML.
//!
//! Nothing here reads anything but its arguments. Row controls carry the
//! record id in `data-*` attributes so a click is dispatched by identity,
//! never by list position.

use crate::models::{Investigation, InvestigationStatus, Watcher};
use crate::store::StateStore;
use crate::view::{SubTab, ViewState, WatcherForm};
use chrono::Local;

pub const EMPTY_WATCHERS: &str = "No file watchers configured";
pub const EMPTY_INVESTIGATIONS: &str = "No investigations yet";

/// Escape text for safe insertion into element content or quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Display-ready values for one watcher (unescaped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherRow {
    pub id: String,
    pub name: String,
    pub directory: String,
    pub file_pattern: String,
    pub state: String,
    pub status_class: &'static str,
    pub status_text: String,
    pub investigation_count: u64,
    pub pattern_count: usize,
    pub toggle_label: &'static str,
}

impl WatcherRow {
    pub fn from_watcher(watcher: &Watcher) -> Self {
        let (status_class, status_text) = if watcher.is_running {
            ("status-active", "Active".to_string())
        } else {
            ("status-inactive", watcher.state.to_string())
        };

        Self {
            id: watcher.id.clone(),
            name: watcher.name.clone(),
            directory: watcher.directory.clone(),
            file_pattern: watcher
                .file_pattern
                .as_deref()
                .filter(|p| !p.is_empty())
                .unwrap_or("*")
                .to_string(),
            state: watcher.state.to_string(),
            status_class,
            status_text,
            investigation_count: watcher.investigation_count,
            pattern_count: watcher.error_patterns.len(),
            toggle_label: if watcher.is_running { "Stop" } else { "Start" },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestigationRow {
    pub id: String,
    pub watcher_name: String,
    pub status: InvestigationStatus,
    pub error_pattern: String,
    pub file_path: String,
    pub occurrences: u64,
    pub last_seen: String,
    pub ignore_disabled: bool,
    pub reinvestigate_disabled: bool,
}

impl InvestigationRow {
    pub fn from_investigation(inv: &Investigation) -> Self {
        Self {
            id: inv.id.clone(),
            watcher_name: inv.watcher_name.clone(),
            status: inv.investigation_status,
            error_pattern: inv.error_pattern.clone(),
            file_path: inv.file_path.clone(),
            occurrences: inv.occurrences,
            last_seen: inv
                .last_seen
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            ignore_disabled: inv.investigation_status == InvestigationStatus::Ignored,
            reinvestigate_disabled: inv.investigation_status == InvestigationStatus::Pending,
        }
    }
}

pub fn watcher_rows(watchers: &[Watcher]) -> Vec<WatcherRow> {
    watchers.iter().map(WatcherRow::from_watcher).collect()
}

/// Rows for the first `limit` investigations, in the order supplied.
pub fn investigation_rows(investigations: &[Investigation], limit: usize) -> Vec<InvestigationRow> {
    investigations
        .iter()
        .take(limit)
        .map(InvestigationRow::from_investigation)
        .collect()
}

fn empty_state(message: &str) -> String {
    format!("<div class=\"empty-state\">{}</div>", message)
}

fn disabled_attr(disabled: bool) -> &'static str {
    if disabled {
        " disabled"
    } else {
        ""
    }
}

pub fn render_watchers(watchers: &[Watcher]) -> String {
    if watchers.is_empty() {
        return empty_state(EMPTY_WATCHERS);
    }

    watcher_rows(watchers)
        .iter()
        .map(render_watcher_row)
        .collect()
}

fn render_watcher_row(row: &WatcherRow) -> String {
    let id = escape_html(&row.id);
    format!(
        concat!(
            "<div class=\"watcher-item\" data-watcher-id=\"{id}\">",
            "<div class=\"watcher-header\"><h4>{name}</h4>",
            "<span class=\"watcher-status {status_class}\">{status_text}</span></div>",
            "<div class=\"watcher-details\">",
            "<div class=\"detail-row\"><span class=\"label\">Directory:</span><span class=\"value\">{directory}</span></div>",
            "<div class=\"detail-row\"><span class=\"label\">Pattern:</span><span class=\"value\">{file_pattern}</span></div>",
            "<div class=\"detail-row\"><span class=\"label\">Investigations:</span><span class=\"value\">{investigations}</span></div>",
            "<div class=\"detail-row\"><span class=\"label\">Error Patterns:</span><span class=\"value\">{patterns} patterns</span></div>",
            "</div>",
            "<div class=\"watcher-actions\">",
            "<button class=\"btn-small\" data-action=\"edit-watcher\" data-watcher-id=\"{id}\">Edit</button>",
            "<button class=\"btn-small\" data-action=\"toggle-watcher\" data-watcher-id=\"{id}\" data-state=\"{state}\">{toggle}</button>",
            "<button class=\"btn-small btn-danger\" data-action=\"delete-watcher\" data-watcher-id=\"{id}\">Delete</button>",
            "</div></div>"
        ),
        id = id,
        name = escape_html(&row.name),
        status_class = row.status_class,
        status_text = escape_html(&row.status_text),
        directory = escape_html(&row.directory),
        file_pattern = escape_html(&row.file_pattern),
        investigations = row.investigation_count,
        patterns = row.pattern_count,
        state = escape_html(&row.state),
        toggle = row.toggle_label,
    )
}

pub fn render_investigations(investigations: &[Investigation], limit: usize) -> String {
    if investigations.is_empty() {
        return empty_state(EMPTY_INVESTIGATIONS);
    }

    investigation_rows(investigations, limit)
        .iter()
        .map(render_investigation_row)
        .collect()
}

fn render_investigation_row(row: &InvestigationRow) -> String {
    let id = escape_html(&row.id);
    format!(
        concat!(
            "<div class=\"investigation-item inv-status-{status}\" data-investigation-id=\"{id}\">",
            "<div class=\"inv-header\"><span class=\"inv-watcher\">{watcher}</span>",
            "<span class=\"inv-status\">{status}</span></div>",
            "<div class=\"inv-error\">{error}</div>",
            "<div class=\"inv-details\">",
            "<span class=\"inv-file\">{file}</span>",
            "<span class=\"inv-occurrences\">Occurrences: {occurrences}</span>",
            "<span class=\"inv-time\">{last_seen}</span>",
            "</div>",
            "<div class=\"inv-actions\">",
            "<button class=\"btn-small\" data-action=\"ignore-investigation\" data-investigation-id=\"{id}\"{ignore_disabled}>Ignore</button>",
            "<button class=\"btn-small\" data-action=\"reinvestigate\" data-investigation-id=\"{id}\"{reinvestigate_disabled}>Reinvestigate</button>",
            "</div></div>"
        ),
        id = id,
        status = row.status,
        watcher = escape_html(&row.watcher_name),
        error = escape_html(&row.error_pattern),
        file = escape_html(&row.file_path),
        occurrences = row.occurrences,
        last_seen = escape_html(&row.last_seen),
        ignore_disabled = disabled_attr(row.ignore_disabled),
        reinvestigate_disabled = disabled_attr(row.reinvestigate_disabled),
    )
}

/// The create/edit form, or nothing when it is closed.
pub fn render_form(form: Option<&WatcherForm>) -> String {
    let Some(form) = form else {
        return String::new();
    };

    let (title, submit) = if form.is_edit() {
        ("Edit Watcher", "Save Changes")
    } else {
        ("Create Watcher", "Create")
    };

    format!(
        concat!(
            "<div id=\"filewatcher-form-container\" data-watcher-id=\"{id}\">",
            "<h3>{title}</h3>",
            "<div class=\"form-row\">",
            "<div class=\"form-group\"><label for=\"watcher-name\">Name</label>",
            "<input id=\"watcher-name\" name=\"name\" value=\"{name}\"></div>",
            "<div class=\"form-group\"><label for=\"watcher-directory\">Directory</label>",
            "<input id=\"watcher-directory\" name=\"directory\" value=\"{directory}\"></div>",
            "</div>",
            "<div class=\"form-group\"><label for=\"watcher-pattern\">File Pattern</label>",
            "<input id=\"watcher-pattern\" name=\"file_pattern\" value=\"{pattern}\" placeholder=\"*.log\"></div>",
            "<div class=\"form-group\"><label for=\"watcher-prompt\">Prompt</label>",
            "<textarea id=\"watcher-prompt\" name=\"prompt\">{prompt}</textarea></div>",
            "<div class=\"form-group\"><label for=\"watcher-error-patterns\">Error Patterns</label>",
            "<textarea id=\"watcher-error-patterns\" name=\"error_patterns\">{error_patterns}</textarea>",
            "<div class=\"help-text\">One pattern per line</div></div>",
            "<div class=\"form-actions\">",
            "<button class=\"btn-small\" data-action=\"cancel-edit\">Cancel</button>",
            "<button class=\"btn-small btn-primary\" data-action=\"save-watcher\"{submitting}>{submit}</button>",
            "</div></div>"
        ),
        id = escape_html(form.watcher_id().unwrap_or("")),
        title = title,
        name = escape_html(&form.name),
        directory = escape_html(&form.directory),
        pattern = escape_html(&form.file_pattern),
        prompt = escape_html(&form.prompt),
        error_patterns = escape_html(&form.error_patterns),
        submitting = disabled_attr(form.submitting),
        submit = submit,
    )
}

pub fn render_tabs(active: SubTab) -> String {
    let tab = |tab: SubTab, label: &str| {
        let class = if tab == active { "tab active" } else { "tab" };
        format!(
            "<div class=\"{}\" data-action=\"switch-tab\" data-tab=\"{}\">{}</div>",
            class,
            tab.as_str(),
            label
        )
    };

    format!(
        "<div class=\"tabs\">{}{}</div>",
        tab(SubTab::Watchers, "Watchers"),
        tab(SubTab::Investigations, "Investigations")
    )
}

/// The whole panel: header, tabs, form, and both tab bodies.
pub fn render_panel(store: &StateStore, view: &ViewState, investigation_limit: usize) -> String {
    let toggle_label = if view.form.is_some() {
        "Cancel"
    } else {
        "Create Watcher"
    };
    let tab_class = |tab: SubTab| {
        if tab == view.active_tab {
            "tab-content active"
        } else {
            "tab-content"
        }
    };

    format!(
        concat!(
            "<div id=\"filewatcher-panel\"{hidden}>",
            "<div class=\"filewatcher-header\"><h3>File Watchers</h3>",
            "<button class=\"btn-small\" data-action=\"toggle-create-form\">{toggle}</button></div>",
            "{tabs}",
            "{form}",
            "<div id=\"watchers-tab\" class=\"{watchers_class}\"><div id=\"filewatcher-list\">{watchers}</div></div>",
            "<div id=\"investigations-tab\" class=\"{investigations_class}\"><div id=\"investigation-list\">{investigations}</div></div>",
            "</div>"
        ),
        hidden = if view.visible { "" } else { " class=\"hidden\"" },
        toggle = toggle_label,
        tabs = render_tabs(view.active_tab),
        form = render_form(view.form.as_ref()),
        watchers_class = tab_class(SubTab::Watchers),
        watchers = render_watchers(store.watchers()),
        investigations_class = tab_class(SubTab::Investigations),
        investigations = render_investigations(store.investigations(), investigation_limit),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WatcherState;
    use chrono::Utc;

    fn watcher(id: &str, name: &str) -> Watcher {
        Watcher {
            id: id.to_string(),
            name: name.to_string(),
            directory: "/var/log/<app>".to_string(),
            file_pattern: None,
            prompt: String::new(),
            error_patterns: vec!["500".to_string()],
            state: WatcherState::Stopped,
            is_running: false,
            investigation_count: 2,
            recent_investigations: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    fn investigation(id: &str, status: InvestigationStatus) -> Investigation {
        Investigation {
            id: id.to_string(),
            watcher_id: None,
            watcher_name: "api".to_string(),
            error_pattern: "<script>alert('x')</script>".to_string(),
            file_path: "/srv/app.log".to_string(),
            occurrences: 3,
            first_seen: None,
            last_seen: Utc::now(),
            investigation_status: status,
            investigation_result: None,
        }
    }

    #[test]
    fn test_escape_html_special_chars() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain /var/log"), "plain /var/log");
    }

    #[test]
    fn test_empty_watchers_marker() {
        assert_eq!(
            render_watchers(&[]),
            "<div class=\"empty-state\">No file watchers configured</div>"
        );
        assert!(render_investigations(&[], 10).contains(EMPTY_INVESTIGATIONS));
    }

    #[test]
    fn test_one_row_per_watcher_keyed_by_id() {
        let html = render_watchers(&[watcher("a", "first"), watcher("b", "second")]);
        assert_eq!(html.matches("class=\"watcher-item\"").count(), 2);
        assert!(html.contains("<div class=\"watcher-item\" data-watcher-id=\"a\">"));
        assert!(html.contains("<div class=\"watcher-item\" data-watcher-id=\"b\">"));
        assert!(html.contains("/var/log/&lt;app&gt;"));
        assert!(!html.contains("<app>"));
    }

    #[test]
    fn test_status_and_toggle_label() {
        let mut running = watcher("a", "first");
        running.is_running = true;
        running.state = WatcherState::Active;
        let row = WatcherRow::from_watcher(&running);
        assert_eq!(row.status_text, "Active");
        assert_eq!(row.toggle_label, "Stop");

        let row = WatcherRow::from_watcher(&watcher("b", "second"));
        assert_eq!(row.status_text, "stopped");
        assert_eq!(row.status_class, "status-inactive");
        assert_eq!(row.toggle_label, "Start");
        assert_eq!(row.file_pattern, "*");
    }

    #[test]
    fn test_unrecognised_state_shown_verbatim() {
        let mut draining = watcher("c", "third");
        draining.state = WatcherState::Other("draining<1>".to_string());

        let row = WatcherRow::from_watcher(&draining);
        assert_eq!(row.status_text, "draining<1>");
        assert_eq!(row.toggle_label, "Start");

        let html = render_watchers(&[draining]);
        assert!(html.contains(">draining&lt;1&gt;</span>"));
        assert!(html.contains("data-state=\"draining&lt;1&gt;\""));
    }

    #[test]
    fn test_investigations_truncated_in_order() {
        let investigations: Vec<Investigation> = (0..15)
            .map(|i| investigation(&format!("inv-{}", i), InvestigationStatus::Pending))
            .collect();

        let rows = investigation_rows(&investigations, 10);
        assert_eq!(rows.len(), 10);
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("inv-{}", i)).collect();
        assert_eq!(ids, expected);

        let html = render_investigations(&investigations, 10);
        assert_eq!(html.matches("class=\"investigation-item").count(), 10);
    }

    #[test]
    fn test_investigation_buttons_disabled_by_status() {
        let html = render_investigations(&[investigation("i1", InvestigationStatus::Ignored)], 10);
        assert!(html.contains("data-action=\"ignore-investigation\" data-investigation-id=\"i1\" disabled>"));
        assert!(html.contains("data-action=\"reinvestigate\" data-investigation-id=\"i1\">"));
        assert!(html.contains("&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt;"));

        let row = InvestigationRow::from_investigation(&investigation("i2", InvestigationStatus::Pending));
        assert!(!row.ignore_disabled);
        assert!(row.reinvestigate_disabled);
    }

    #[test]
    fn test_form_renders_escaped_values() {
        let mut form = WatcherForm::blank();
        form.name = "\"quoted\"".to_string();
        form.error_patterns = "500\n<502>".to_string();

        let html = render_form(Some(&form));
        assert!(html.contains("value=\"&quot;quoted&quot;\""));
        assert!(html.contains(">500\n&lt;502&gt;</textarea>"));
        assert!(html.contains("Create Watcher"));
        assert!(render_form(None).is_empty());
    }

    #[test]
    fn test_panel_marks_active_tab() {
        let store = StateStore::new();
        let view = ViewState {
            active_tab: SubTab::Investigations,
            ..ViewState::default()
        };

        let html = render_panel(&store, &view, 10);
        assert!(html.contains("<div class=\"tab active\" data-action=\"switch-tab\" data-tab=\"investigations\">"));
        assert!(html.contains("<div id=\"investigations-tab\" class=\"tab-content active\">"));
        assert!(html.contains("<div id=\"watchers-tab\" class=\"tab-content\">"));
        assert!(html.contains(EMPTY_WATCHERS));
    }
}
