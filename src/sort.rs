use crate::calendar::day_key;
use crate::model::Student;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    FirstName,
    LastName,
    Email,
    GradeLevel,
    EnrollmentDate,
    Status,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "firstName" => Some(Self::FirstName),
            "lastName" => Some(Self::LastName),
            "email" => Some(Self::Email),
            "gradeLevel" => Some(Self::GradeLevel),
            "enrollmentDate" => Some(Self::EnrollmentDate),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Email => "email",
            Self::GradeLevel => "gradeLevel",
            Self::EnrollmentDate => "enrollmentDate",
            Self::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::FirstName,
            direction: SortDirection::Asc,
        }
    }
}

impl SortSpec {
    /// Column-header click semantics: the same column toggles direction, a
    /// new column resets to ascending.
    pub fn click(self, field: SortField) -> Self {
        if self.field == field {
            Self {
                field,
                direction: match self.direction {
                    SortDirection::Asc => SortDirection::Desc,
                    SortDirection::Desc => SortDirection::Asc,
                },
            }
        } else {
            Self {
                field,
                direction: SortDirection::Asc,
            }
        }
    }
}

fn compare_field(a: &Student, b: &Student, field: SortField) -> Ordering {
    match field {
        SortField::FirstName => a.first_name.cmp(&b.first_name),
        SortField::LastName => a.last_name.cmp(&b.last_name),
        SortField::Email => a.email.cmp(&b.email),
        SortField::GradeLevel => a.grade_level.cmp(&b.grade_level),
        SortField::EnrollmentDate => {
            // Day-key order; unparseable dates sort first so they stay visible.
            let ka = day_key(&a.enrollment_date);
            let kb = day_key(&b.enrollment_date);
            ka.cmp(&kb)
        }
        SortField::Status => a.status.cmp(&b.status),
    }
}

/// Stable sort: equal keys keep the input (roster) order, so repeated sorts
/// are deterministic.
pub fn sort_students(students: &mut [Student], spec: SortSpec) {
    students.sort_by(|a, b| {
        let ord = compare_field(a, b, spec.field);
        match spec.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}
