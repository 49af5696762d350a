use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentStatus {
    Active,
    Inactive,
    Suspended,
}

impl StudentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "late" => Some(Self::Late),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeCategory {
    Assignment,
    Quiz,
    Exam,
    Project,
    Homework,
}

impl GradeCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assignment" => Some(Self::Assignment),
            "quiz" => Some(Self::Quiz),
            "exam" => Some(Self::Exam),
            "project" => Some(Self::Project),
            "homework" => Some(Self::Homework),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::Quiz => "quiz",
            Self::Exam => "exam",
            Self::Project => "project",
            Self::Homework => "homework",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub grade_level: String,
    pub status: String,
    pub enrollment_date: String,
    pub sort_order: i64,
}

impl Student {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub date: String,
    pub day_key: String,
    pub status: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub subject: String,
    pub assignment_name: String,
    pub score: f64,
    pub max_score: f64,
    pub category: String,
    pub date: String,
    pub day_key: String,
}

/// A validated new-student payload. Construction is the only way to get one,
/// so every draft that reaches the store has passed the field checks.
#[derive(Debug, Clone)]
pub struct StudentDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub grade_level: String,
    pub status: StudentStatus,
    pub enrollment_date: String,
}

fn required_trimmed(params: &serde_json::Value, key: &str) -> Result<String, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing {}", key))
}

fn optional_trimmed(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
}

impl StudentDraft {
    pub fn parse(params: &serde_json::Value) -> Result<Self, String> {
        let first_name = required_trimmed(params, "firstName")?;
        let last_name = required_trimmed(params, "lastName")?;
        let email = optional_trimmed(params, "email").unwrap_or_default();
        let phone = optional_trimmed(params, "phone").unwrap_or_default();
        let grade_level = optional_trimmed(params, "gradeLevel").unwrap_or_default();
        let status = match optional_trimmed(params, "status") {
            None => StudentStatus::Active,
            Some(raw) => StudentStatus::parse(&raw)
                .ok_or("status must be one of: active, inactive, suspended")?,
        };
        let enrollment_date = required_trimmed(params, "enrollmentDate")?;
        if crate::calendar::day_key(&enrollment_date).is_none() {
            return Err("enrollmentDate must be YYYY-MM-DD or an RFC3339 timestamp".into());
        }
        Ok(Self {
            first_name,
            last_name,
            email,
            phone,
            grade_level,
            status,
            enrollment_date,
        })
    }
}

/// Field-by-field patch for `students.update`. Unknown keys are rejected so a
/// typo never silently no-ops.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub grade_level: Option<String>,
    pub status: Option<StudentStatus>,
    pub enrollment_date: Option<String>,
}

impl StudentPatch {
    pub fn parse(patch: &serde_json::Map<String, serde_json::Value>) -> Result<Self, String> {
        let mut out = Self::default();
        for (k, v) in patch {
            let s = v
                .as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| format!("{} must be string", k))?;
            match k.as_str() {
                "firstName" => {
                    if s.is_empty() {
                        return Err("firstName must not be empty".into());
                    }
                    out.first_name = Some(s);
                }
                "lastName" => {
                    if s.is_empty() {
                        return Err("lastName must not be empty".into());
                    }
                    out.last_name = Some(s);
                }
                "email" => out.email = Some(s),
                "phone" => out.phone = Some(s),
                "gradeLevel" => out.grade_level = Some(s),
                "status" => {
                    out.status = Some(
                        StudentStatus::parse(&s)
                            .ok_or("status must be one of: active, inactive, suspended")?,
                    );
                }
                "enrollmentDate" => {
                    if crate::calendar::day_key(&s).is_none() {
                        return Err(
                            "enrollmentDate must be YYYY-MM-DD or an RFC3339 timestamp".into()
                        );
                    }
                    out.enrollment_date = Some(s);
                }
                _ => return Err(format!("unknown student field: {}", k)),
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceDraft {
    pub student_id: String,
    pub date: String,
    pub day_key: String,
    pub status: AttendanceStatus,
    pub notes: String,
}

impl AttendanceDraft {
    pub fn parse(params: &serde_json::Value) -> Result<Self, String> {
        let student_id = required_trimmed(params, "studentId")?;
        let date = required_trimmed(params, "date")?;
        let day = crate::calendar::day_key(&date)
            .ok_or("date must be YYYY-MM-DD or an RFC3339 timestamp")?;
        let status_raw = required_trimmed(params, "status")?;
        let status = AttendanceStatus::parse(&status_raw)
            .ok_or("status must be one of: present, absent, late")?;
        let notes = optional_trimmed(params, "notes").unwrap_or_default();
        Ok(Self {
            student_id,
            date,
            day_key: day.format("%Y-%m-%d").to_string(),
            status,
            notes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GradeDraft {
    pub student_id: String,
    pub subject: String,
    pub assignment_name: String,
    pub score: f64,
    pub max_score: f64,
    pub category: GradeCategory,
    pub date: String,
    pub day_key: String,
}

impl GradeDraft {
    pub fn parse(params: &serde_json::Value) -> Result<Self, String> {
        let student_id = required_trimmed(params, "studentId")?;
        let subject = required_trimmed(params, "subject")?;
        let assignment_name = required_trimmed(params, "assignmentName")?;
        let score = params
            .get("score")
            .and_then(|v| v.as_f64())
            .ok_or("missing score")?;
        if !score.is_finite() || score < 0.0 {
            return Err("score must be >= 0".into());
        }
        let max_score = params
            .get("maxScore")
            .and_then(|v| v.as_f64())
            .ok_or("missing maxScore")?;
        if !max_score.is_finite() || max_score <= 0.0 {
            return Err("maxScore must be > 0".into());
        }
        let category_raw = required_trimmed(params, "category")?;
        let category = GradeCategory::parse(&category_raw)
            .ok_or("category must be one of: assignment, quiz, exam, project, homework")?;
        let date = required_trimmed(params, "date")?;
        let day = crate::calendar::day_key(&date)
            .ok_or("date must be YYYY-MM-DD or an RFC3339 timestamp")?;
        Ok(Self {
            student_id,
            subject,
            assignment_name,
            score,
            max_score,
            category,
            date,
            day_key: day.format("%Y-%m-%d").to_string(),
        })
    }
}
