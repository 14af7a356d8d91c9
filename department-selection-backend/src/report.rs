//! Summaries of who chose what, for the admin screens and downloads.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use department_selection_database::models::{DepartmentWithCategory, MemberWithDepartments};
use serde::{Deserialize, Serialize};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    #[default]
    Department,
    Member,
}

impl ReportKind {
    #[must_use]
    pub fn file_name(self, day: NaiveDate) -> String {
        let prefix = match self {
            Self::Department => "departments",
            Self::Member => "members",
        };
        format!("{prefix}-report-{}.csv", day.format("%Y-%m-%d"))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportMember {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub submitted_on: DateTime<Utc>,
}

impl ReportMember {
    fn from_member(member: &MemberWithDepartments) -> Self {
        Self {
            full_name: member.member.full_name.clone(),
            phone: member.member.phone.clone(),
            email: member.member.email.clone(),
            address: member.member.address.clone(),
            submitted_on: member.member.created_at,
        }
    }

    fn record(&self) -> [String; 5] {
        [
            self.full_name.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.address.clone(),
            self.submitted_on.format(TIMESTAMP_FORMAT).to_string(),
        ]
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRow {
    pub department: String,
    pub category: String,
    pub member_count: usize,
    pub members: Vec<ReportMember>,
}

/// One row per department in the order given, each listing its members in
/// the order of `members`.
#[must_use]
pub fn by_department(
    departments: &[DepartmentWithCategory],
    members: &[MemberWithDepartments],
) -> Vec<DepartmentRow> {
    departments
        .iter()
        .map(|department| {
            let members: Vec<ReportMember> = members
                .iter()
                .filter(|member| member.department_ids().contains(&department.id))
                .map(ReportMember::from_member)
                .collect();
            DepartmentRow {
                department: department.name.clone(),
                category: department.category_name().to_owned(),
                member_count: members.len(),
                members,
            }
        })
        .collect()
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberRow {
    #[serde(flatten)]
    pub member: ReportMember,
    /// Parallel to [`MemberReport::departments`].
    pub selected: Vec<bool>,
}

/// A pivot with one column per department.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberReport {
    pub departments: Vec<String>,
    pub rows: Vec<MemberRow>,
}

#[must_use]
pub fn by_member(
    departments: &[DepartmentWithCategory],
    members: &[MemberWithDepartments],
) -> MemberReport {
    let rows = members
        .iter()
        .map(|member| {
            let chosen: HashSet<i32> = member.department_ids().into_iter().collect();
            MemberRow {
                member: ReportMember::from_member(member),
                selected: departments
                    .iter()
                    .map(|department| chosen.contains(&department.id))
                    .collect(),
            }
        })
        .collect();
    MemberReport {
        departments: departments
            .iter()
            .map(|department| department.name.clone())
            .collect(),
        rows,
    }
}

const MEMBER_COLUMNS: [&str; 5] = ["Full Name", "Phone", "Email", "Address", "Submitted On"];

/// Departments without members still get a row with empty member columns.
pub fn department_csv(rows: &[DepartmentRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(
        ["Department", "Category", "Member Count"]
            .into_iter()
            .chain(MEMBER_COLUMNS),
    )?;
    for row in rows {
        let count = row.member_count.to_string();
        let head = [row.department.as_str(), row.category.as_str(), count.as_str()];
        if row.members.is_empty() {
            writer.write_record(head.into_iter().chain([""; 5]))?;
        }
        for member in &row.members {
            let record = member.record();
            writer.write_record(head.into_iter().chain(record.iter().map(String::as_str)))?;
        }
    }
    finish(writer)
}

pub fn member_csv(report: &MemberReport) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(
        MEMBER_COLUMNS
            .into_iter()
            .chain(report.departments.iter().map(String::as_str)),
    )?;
    for row in &report.rows {
        let record = row.member.record();
        writer.write_record(
            record.iter().map(String::as_str).chain(
                row.selected
                    .iter()
                    .map(|selected| if *selected { "Yes" } else { "" }),
            ),
        )?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}
