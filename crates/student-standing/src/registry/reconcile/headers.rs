use std::collections::HashMap;
use std::sync::OnceLock;

/// Canonical logical field names the reconciler understands. Columns whose
/// header resolves to none of these are ignored.
pub(crate) const STUDENT_NUMBER: &str = "student_number";
pub(crate) const REGISTRATION_NUMBER: &str = "registration_number";
pub(crate) const UNIT_ID: &str = "unit_id";
pub(crate) const PROGRAM: &str = "program";
pub(crate) const YEAR_OF_STUDY: &str = "year_of_study";
pub(crate) const TERM: &str = "term";
pub(crate) const GPA: &str = "gpa";
pub(crate) const ATTENDANCE_RATE: &str = "attendance_rate";
pub(crate) const BALANCE: &str = "balance";

static HEADER_MAP: OnceLock<HashMap<String, &'static str>> = OnceLock::new();

pub(crate) fn canonical_field(header: &str) -> Option<&'static str> {
    header_map().get(&normalize_header(header)).copied()
}

/// Strips BOM/zero-width characters, lowercases, and collapses separator
/// runs so "Attendance-Rate (%)" and "attendance rate" resolve alike.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let mut out = String::with_capacity(cleaned.len());
    let mut last_was_space = true;
    for ch in cleaned.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

fn header_map() -> &'static HashMap<String, &'static str> {
    HEADER_MAP.get_or_init(|| {
        // Accepted synonym spellings per logical field, in the order legacy
        // systems produced them.
        const SYNONYMS: &[(&str, &str)] = &[
            ("student_number", STUDENT_NUMBER),
            ("student no", STUDENT_NUMBER),
            ("student id", STUDENT_NUMBER),
            ("matric no", STUDENT_NUMBER),
            ("matric number", STUDENT_NUMBER),
            ("matriculation number", STUDENT_NUMBER),
            ("registration number", REGISTRATION_NUMBER),
            ("reg no", REGISTRATION_NUMBER),
            ("reg number", REGISTRATION_NUMBER),
            ("unit", UNIT_ID),
            ("unit id", UNIT_ID),
            ("department", UNIT_ID),
            ("dept", UNIT_ID),
            ("faculty", UNIT_ID),
            ("program", PROGRAM),
            ("programme", PROGRAM),
            ("course", PROGRAM),
            ("course of study", PROGRAM),
            ("year_of_study", YEAR_OF_STUDY),
            ("year", YEAR_OF_STUDY),
            ("level", YEAR_OF_STUDY),
            ("study year", YEAR_OF_STUDY),
            ("term", TERM),
            ("semester", TERM),
            ("semester of study", TERM),
            ("gpa", GPA),
            ("cgpa", GPA),
            ("grade point average", GPA),
            ("attendance_rate", ATTENDANCE_RATE),
            ("attendance", ATTENDANCE_RATE),
            ("attendance rate", ATTENDANCE_RATE),
            ("attendance percentage", ATTENDANCE_RATE),
            ("attendance pct", ATTENDANCE_RATE),
            ("balance", BALANCE),
            ("outstanding balance", BALANCE),
            ("outstanding fees", BALANCE),
            ("amount owed", BALANCE),
            ("fees owed", BALANCE),
        ];

        let mut map = HashMap::with_capacity(SYNONYMS.len());
        for (spelling, field) in SYNONYMS {
            map.insert(normalize_header(spelling), *field);
        }
        map
    })
}
