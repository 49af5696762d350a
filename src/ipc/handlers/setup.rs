use crate::calendar::WeekStart;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::metrics::AlertPolicy;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Calendar,
    Alerts,
    Reports,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "calendar" => Some(Self::Calendar),
            "alerts" => Some(Self::Alerts),
            "reports" => Some(Self::Reports),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Calendar => "setup.calendar",
            Self::Alerts => "setup.alerts",
            Self::Reports => "setup.reports",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Calendar => json!({
            "weekStart": "sunday"
        }),
        SetupSection::Alerts => json!({
            "attendanceRateMin": 0.8,
            "gradeAverageMin": 0.7,
            "attendanceWindow": 10,
            "gradeWindow": 3
        }),
        SetupSection::Reports => json!({
            "topPerformersCount": 5,
            "needsAttentionLimit": 5,
            "recentActivityLimit": 5
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_fraction(v: &Value, key: &str) -> Result<f64, String> {
    let n = v.as_f64().ok_or_else(|| format!("{} must be number", key))?;
    if !(0.0..=1.0).contains(&n) {
        return Err(format!("{} must be in 0.0..=1.0", key));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Calendar => match k.as_str() {
                "weekStart" => {
                    let s = v
                        .as_str()
                        .map(|s| s.trim().to_ascii_lowercase())
                        .ok_or_else(|| format!("{} must be string", k))?;
                    if WeekStart::parse(&s).is_none() {
                        return Err("weekStart must be one of: sunday, monday".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown calendar field: {}", k)),
            },
            SetupSection::Alerts => match k.as_str() {
                "attendanceRateMin" | "gradeAverageMin" => {
                    obj.insert(k.clone(), Value::from(parse_fraction(v, k)?));
                }
                "attendanceWindow" | "gradeWindow" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 50)?));
                }
                _ => return Err(format!("unknown alerts field: {}", k)),
            },
            SetupSection::Reports => match k.as_str() {
                "topPerformersCount" | "needsAttentionLimit" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 20)?));
                }
                "recentActivityLimit" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 10)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values must not block setup.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn load_section_map(conn: &Connection, section: SetupSection) -> Option<Map<String, Value>> {
    load_section(conn, section)
        .ok()
        .and_then(|v| v.as_object().cloned())
}

pub fn load_week_start(conn: &Connection) -> WeekStart {
    load_section_map(conn, SetupSection::Calendar)
        .and_then(|obj| {
            obj.get("weekStart")
                .and_then(|v| v.as_str())
                .and_then(WeekStart::parse)
        })
        .unwrap_or(WeekStart::Sunday)
}

pub fn load_alert_policy(conn: &Connection) -> AlertPolicy {
    let defaults = AlertPolicy::default();
    let Some(obj) = load_section_map(conn, SetupSection::Alerts) else {
        return defaults;
    };
    AlertPolicy {
        attendance_rate_min: obj
            .get("attendanceRateMin")
            .and_then(|v| v.as_f64())
            .unwrap_or(defaults.attendance_rate_min),
        grade_average_min: obj
            .get("gradeAverageMin")
            .and_then(|v| v.as_f64())
            .unwrap_or(defaults.grade_average_min),
        attendance_window: obj
            .get("attendanceWindow")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(defaults.attendance_window),
        grade_window: obj
            .get("gradeWindow")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(defaults.grade_window),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportDefaults {
    pub top_performers_count: usize,
    pub needs_attention_limit: usize,
    pub recent_activity_limit: usize,
}

pub fn load_report_defaults(conn: &Connection) -> ReportDefaults {
    let obj = load_section_map(conn, SetupSection::Reports).unwrap_or_default();
    let get = |key: &str, fallback: usize| {
        obj.get(key)
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .filter(|n| *n > 0)
            .unwrap_or(fallback)
    };
    ReportDefaults {
        top_performers_count: get("topPerformersCount", 5),
        needs_attention_limit: get("needsAttentionLimit", 5),
        recent_activity_limit: get("recentActivityLimit", 5),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let calendar = match load_section(conn, SetupSection::Calendar) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let alerts = match load_section(conn, SetupSection::Alerts) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let reports = match load_section(conn, SetupSection::Reports) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "calendar": calendar,
            "alerts": alerts,
            "reports": reports
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "section": section_raw, "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
