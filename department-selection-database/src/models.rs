use std::collections::HashMap;

use chrono::{DateTime, Utc};
use department_selection_engine::{
    CategoryEntry, CategoryId, DepartmentEntry, DepartmentId, Directory, MemberDetails,
    SelectionLimit, ValidationError,
};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{categories, departments, member_departments, members, settings};

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Queryable, Selectable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub max_selections: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = departments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: i32,
    pub name: String,
    pub category_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: i32,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Applies the given details. The result must still have every required
    /// field.
    pub(crate) fn apply(&mut self, update: &MemberUpdate) -> Result<(), ValidationError> {
        let details = MemberDetails {
            full_name: update.full_name.clone().unwrap_or_else(|| self.full_name.clone()),
            phone: self.phone.clone(),
            email: update.email.clone().unwrap_or_else(|| self.email.clone()),
            address: update.address.clone().unwrap_or_else(|| self.address.clone()),
        };
        details.validate()?;
        self.full_name = details.full_name;
        self.email = details.email;
        self.address = details.address;
        Ok(())
    }
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = member_departments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct MemberDepartment {
    pub id: i32,
    pub member_id: i32,
    pub department_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Setting {
    pub key: String,
    pub value: String,
}

#[derive(Insertable)]
#[diesel(table_name = categories)]
pub(crate) struct NewCategory<'a> {
    pub name: &'a str,
    pub max_selections: i32,
}

#[derive(Insertable)]
#[diesel(table_name = departments)]
pub(crate) struct NewDepartment<'a> {
    pub name: &'a str,
    pub category_id: Option<i32>,
}

#[derive(Insertable)]
#[diesel(table_name = members)]
pub(crate) struct NewMember<'a> {
    pub full_name: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
    pub address: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = member_departments)]
pub(crate) struct NewMemberDepartment {
    pub member_id: i32,
    pub department_id: i32,
}

#[derive(Insertable)]
#[diesel(table_name = settings)]
pub(crate) struct NewSetting<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Input for creating or updating a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChange {
    pub name: String,
    pub max_selections: SelectionLimit,
}

/// Input for creating or updating a department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentChange {
    pub name: String,
    pub category_id: Option<CategoryId>,
}

/// Partial update of a member, `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub selected_departments: Option<Vec<DepartmentId>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub id: i32,
    pub name: String,
    pub category_id: Option<i32>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithDepartments {
    #[serde(flatten)]
    pub category: Category,
    pub departments: Vec<DepartmentSummary>,
}

/// Every category with its departments plus the uncategorized ones.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentDirectory {
    pub categories: Vec<CategoryWithDepartments>,
    pub uncategorized: Vec<DepartmentSummary>,
}

impl DepartmentDirectory {
    /// Categories sorted by name, departments sorted by name inside.
    #[must_use]
    pub fn assemble(mut categories: Vec<Category>, mut departments: Vec<Department>) -> Self {
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        departments.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let mut by_category: HashMap<i32, Vec<DepartmentSummary>> = HashMap::new();
        let mut uncategorized = Vec::new();
        for department in departments {
            let summary = DepartmentSummary {
                id: department.id,
                name: department.name,
                category_id: department.category_id,
            };
            match department.category_id {
                Some(category_id) => by_category.entry(category_id).or_default().push(summary),
                None => uncategorized.push(summary),
            }
        }

        let categories = categories
            .into_iter()
            .map(|category| CategoryWithDepartments {
                departments: by_category.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect();

        Self {
            categories,
            uncategorized,
        }
    }

    #[must_use]
    pub fn to_directory(&self) -> Directory {
        let entry = |department: &DepartmentSummary| DepartmentEntry {
            id: DepartmentId(department.id),
            name: department.name.clone(),
        };
        Directory::new(
            self.categories
                .iter()
                .map(|category| CategoryEntry {
                    id: CategoryId(category.category.id),
                    name: category.category.name.clone(),
                    max_selections: SelectionLimit::from_i32(category.category.max_selections)
                        .unwrap_or_default(),
                    departments: category.departments.iter().map(entry).collect(),
                })
                .collect(),
            self.uncategorized.iter().map(entry).collect(),
        )
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CategoryRef {
    pub id: i32,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentWithCategory {
    pub id: i32,
    pub name: String,
    pub category_id: Option<i32>,
    pub category: Option<CategoryRef>,
}

impl DepartmentWithCategory {
    #[must_use]
    pub fn category_name(&self) -> &str {
        self.category
            .as_ref()
            .map_or(UNCATEGORIZED, |category| category.name.as_str())
    }

    /// All departments sorted by name with their category resolved.
    #[must_use]
    pub fn resolve_all(departments: &[Department], categories: &[Category]) -> Vec<Self> {
        let categories: HashMap<i32, &Category> =
            categories.iter().map(|category| (category.id, category)).collect();
        let mut resolved: Vec<Self> = departments
            .iter()
            .map(|department| Self {
                id: department.id,
                name: department.name.clone(),
                category_id: department.category_id,
                category: department
                    .category_id
                    .and_then(|id| categories.get(&id))
                    .map(|category| CategoryRef {
                        id: category.id,
                        name: category.name.clone(),
                    }),
            })
            .collect();
        resolved.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        resolved
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberDepartmentView {
    pub id: i32,
    pub member_id: i32,
    pub department_id: i32,
    pub created_at: DateTime<Utc>,
    pub department: DepartmentWithCategory,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberWithDepartments {
    #[serde(flatten)]
    pub member: Member,
    pub departments: Vec<MemberDepartmentView>,
}

impl MemberWithDepartments {
    /// Attaches the links to their members, keeping the order of `members`.
    /// Links pointing at missing departments are dropped.
    #[must_use]
    pub fn assemble(
        members: Vec<Member>,
        mut links: Vec<MemberDepartment>,
        departments: &[Department],
        categories: &[Category],
    ) -> Vec<Self> {
        links.sort_by_key(|link| link.id);
        let departments: HashMap<i32, DepartmentWithCategory> =
            DepartmentWithCategory::resolve_all(departments, categories)
                .into_iter()
                .map(|department| (department.id, department))
                .collect();

        let mut by_member: HashMap<i32, Vec<MemberDepartmentView>> = HashMap::new();
        for link in links {
            if let Some(department) = departments.get(&link.department_id) {
                by_member
                    .entry(link.member_id)
                    .or_default()
                    .push(MemberDepartmentView {
                        id: link.id,
                        member_id: link.member_id,
                        department_id: link.department_id,
                        created_at: link.created_at,
                        department: department.clone(),
                    });
            }
        }

        members
            .into_iter()
            .map(|member| Self {
                departments: by_member.remove(&member.id).unwrap_or_default(),
                member,
            })
            .collect()
    }

    #[must_use]
    pub fn department_ids(&self) -> Vec<i32> {
        self.departments
            .iter()
            .map(|link| link.department_id)
            .collect()
    }
}

/// Departments and members read at the same point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportData {
    pub departments: Vec<DepartmentWithCategory>,
    pub members: Vec<MemberWithDepartments>,
}

pub(crate) fn limit_to_column(limit: SelectionLimit) -> i32 {
    i32::try_from(limit.get()).unwrap_or(i32::MAX)
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone as _;

    use super::*;

    pub fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, second).unwrap()
    }

    fn category(id: i32, name: &str, max_selections: i32) -> Category {
        Category {
            id,
            name: name.to_owned(),
            max_selections,
            created_at: at(0),
        }
    }

    fn department(id: i32, name: &str, category_id: Option<i32>) -> Department {
        Department {
            id,
            name: name.to_owned(),
            category_id,
            created_at: at(0),
        }
    }

    #[test]
    fn assembles_sorted_directory() {
        let directory = DepartmentDirectory::assemble(
            vec![category(2, "Outreach", 1), category(1, "Music", 2)],
            vec![
                department(3, "Praise Team", Some(1)),
                department(4, "Choir", Some(1)),
                department(5, "Ushering", None),
                department(6, "Evangelism", Some(2)),
            ],
        );
        assert_eq!(directory.categories[0].category.name, "Music");
        let names: Vec<&str> = directory.categories[0]
            .departments
            .iter()
            .map(|department| department.name.as_str())
            .collect();
        assert_eq!(names, vec!["Choir", "Praise Team"]);
        assert_eq!(directory.uncategorized.len(), 1);

        let engine_directory = directory.to_directory();
        assert_eq!(
            engine_directory
                .category_of(DepartmentId(3))
                .map(|category| category.max_selections.get()),
            Some(2)
        );
    }

    #[test]
    fn directory_json_matches_api_shape() {
        let directory = DepartmentDirectory::assemble(
            vec![category(1, "Music", 1)],
            vec![department(2, "Choir", Some(1))],
        );
        let json = serde_json::to_value(&directory).unwrap();
        assert_eq!(json["categories"][0]["maxSelections"], 1);
        assert_eq!(json["categories"][0]["departments"][0]["categoryId"], 1);
        assert!(json["categories"][0]["createdAt"].is_string());
    }

    #[test]
    fn assembles_members_with_departments() {
        let member = Member {
            id: 7,
            full_name: "Ada".to_owned(),
            phone: "1".to_owned(),
            email: String::new(),
            address: "x".to_owned(),
            created_at: at(1),
        };
        let links = vec![
            MemberDepartment {
                id: 2,
                member_id: 7,
                department_id: 5,
                created_at: at(1),
            },
            MemberDepartment {
                id: 1,
                member_id: 7,
                department_id: 2,
                created_at: at(1),
            },
        ];
        let members = MemberWithDepartments::assemble(
            vec![member],
            links,
            &[
                department(2, "Choir", Some(1)),
                department(5, "Ushering", None),
            ],
            &[category(1, "Music", 1)],
        );
        assert_eq!(members[0].department_ids(), vec![2, 5]);
        assert_eq!(members[0].departments[0].department.category_name(), "Music");
        assert_eq!(
            members[0].departments[1].department.category_name(),
            UNCATEGORIZED
        );
    }
}
