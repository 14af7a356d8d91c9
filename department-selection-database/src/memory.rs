//! A [`Repository`] kept in process memory.
//!
//! Every operation holds one lock for its whole duration, which makes it
//! atomic. All checks run before the first write, so a rejected operation
//! leaves nothing behind.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use department_selection_engine::{
    normalize_phone, validate_selection, validate_submission, CategoryId, DepartmentId,
    GlobalLimit, Submission,
};
use tokio::sync::Mutex;
use tracing::info;

use crate::models::{
    limit_to_column, Category, CategoryChange, Department, DepartmentChange, DepartmentDirectory,
    DepartmentWithCategory, Member, MemberDepartment, MemberUpdate, MemberWithDepartments,
    ReportData,
};
use crate::{seed, validate_setting, Entity, Repository, RepositoryError};

#[derive(Debug, Default)]
struct State {
    categories: BTreeMap<i32, Category>,
    departments: BTreeMap<i32, Department>,
    members: BTreeMap<i32, Member>,
    links: Vec<MemberDepartment>,
    settings: BTreeMap<String, String>,
    last_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn directory(&self) -> DepartmentDirectory {
        DepartmentDirectory::assemble(
            self.categories.values().cloned().collect(),
            self.departments.values().cloned().collect(),
        )
    }

    fn limit(&self, fallback: GlobalLimit) -> GlobalLimit {
        GlobalLimit::from_setting(
            self.settings.get(GlobalLimit::SETTING_KEY).map(String::as_str),
            fallback,
        )
    }

    fn check_category(&self, category: Option<CategoryId>) -> Result<(), RepositoryError> {
        match category {
            Some(id) if !self.categories.contains_key(&id.0) => {
                Err(RepositoryError::UnknownCategory(id))
            }
            _ => Ok(()),
        }
    }

    fn link(&mut self, member_id: i32, departments: &[DepartmentId]) {
        let now = Utc::now();
        for department in departments {
            let id = self.next_id();
            self.links.push(MemberDepartment {
                id,
                member_id,
                department_id: department.0,
                created_at: now,
            });
        }
    }

    fn insert_category(&mut self, name: &str, max_selections: i32) -> Category {
        let category = Category {
            id: self.next_id(),
            name: name.to_owned(),
            max_selections,
            created_at: Utc::now(),
        };
        self.categories.insert(category.id, category.clone());
        category
    }

    fn insert_department(&mut self, name: &str, category_id: Option<i32>) -> Department {
        let department = Department {
            id: self.next_id(),
            name: name.to_owned(),
            category_id,
            created_at: Utc::now(),
        };
        self.departments.insert(department.id, department.clone());
        department
    }

    fn departments_with_category(&self) -> Vec<DepartmentWithCategory> {
        let departments: Vec<Department> = self.departments.values().cloned().collect();
        let categories: Vec<Category> = self.categories.values().cloned().collect();
        DepartmentWithCategory::resolve_all(&departments, &categories)
    }

    fn newest_members(&self) -> Vec<MemberWithDepartments> {
        let mut members: Vec<Member> = self.members.values().cloned().collect();
        members.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        self.with_departments(members)
    }

    fn with_departments(&self, members: Vec<Member>) -> Vec<MemberWithDepartments> {
        let departments: Vec<Department> = self.departments.values().cloned().collect();
        let categories: Vec<Category> = self.categories.values().cloned().collect();
        let ids: HashSet<i32> = members.iter().map(|member| member.id).collect();
        let links = self
            .links
            .iter()
            .filter(|link| ids.contains(&link.member_id))
            .cloned()
            .collect();
        MemberWithDepartments::assemble(members, links, &departments, &categories)
    }
}

#[derive(Debug)]
pub struct MemoryRepository {
    state: Mutex<State>,
    fallback_limit: GlobalLimit,
}

impl MemoryRepository {
    #[must_use]
    pub fn new(fallback_limit: GlobalLimit) -> Self {
        Self {
            state: Mutex::new(State::default()),
            fallback_limit,
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn directory(&self) -> Result<DepartmentDirectory, RepositoryError> {
        Ok(self.state.lock().await.directory())
    }

    async fn create_category(&self, change: CategoryChange) -> Result<Category, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.insert_category(&change.name, limit_to_column(change.max_selections)))
    }

    async fn update_category(
        &self,
        id: CategoryId,
        change: CategoryChange,
    ) -> Result<Category, RepositoryError> {
        let mut state = self.state.lock().await;
        let category = state
            .categories
            .get_mut(&id.0)
            .ok_or(RepositoryError::NotFound(Entity::Category))?;
        category.name = change.name;
        category.max_selections = limit_to_column(change.max_selections);
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.categories.remove(&id.0).is_none() {
            return Err(RepositoryError::NotFound(Entity::Category));
        }
        for department in state.departments.values_mut() {
            if department.category_id == Some(id.0) {
                department.category_id = None;
            }
        }
        Ok(())
    }

    async fn list_departments(&self) -> Result<Vec<DepartmentWithCategory>, RepositoryError> {
        Ok(self.state.lock().await.departments_with_category())
    }

    async fn create_department(
        &self,
        change: DepartmentChange,
    ) -> Result<Department, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check_category(change.category_id)?;
        Ok(state.insert_department(&change.name, change.category_id.map(|id| id.0)))
    }

    async fn update_department(
        &self,
        id: DepartmentId,
        change: DepartmentChange,
    ) -> Result<Department, RepositoryError> {
        let mut state = self.state.lock().await;
        state.check_category(change.category_id)?;
        let department = state
            .departments
            .get_mut(&id.0)
            .ok_or(RepositoryError::NotFound(Entity::Department))?;
        department.name = change.name;
        department.category_id = change.category_id.map(|id| id.0);
        Ok(department.clone())
    }

    async fn delete_department(&self, id: DepartmentId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.departments.remove(&id.0).is_none() {
            return Err(RepositoryError::NotFound(Entity::Department));
        }
        state.links.retain(|link| link.department_id != id.0);
        Ok(())
    }

    async fn list_members(&self) -> Result<Vec<MemberWithDepartments>, RepositoryError> {
        Ok(self.state.lock().await.newest_members())
    }

    async fn report_data(&self) -> Result<ReportData, RepositoryError> {
        let state = self.state.lock().await;
        Ok(ReportData {
            departments: state.departments_with_category(),
            members: state.newest_members(),
        })
    }

    async fn get_member(&self, id: i32) -> Result<MemberWithDepartments, RepositoryError> {
        let state = self.state.lock().await;
        let member = state
            .members
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(Entity::Member))?;
        state
            .with_departments(vec![member])
            .pop()
            .ok_or(RepositoryError::NotFound(Entity::Member))
    }

    async fn find_member_by_phone(&self, phone: &str) -> Result<Member, RepositoryError> {
        let state = self.state.lock().await;
        let normalized = normalize_phone(phone);
        state
            .members
            .values()
            .find(|member| member.phone == phone)
            .or_else(|| {
                state
                    .members
                    .values()
                    .find(|member| normalize_phone(&member.phone) == normalized)
            })
            .cloned()
            .ok_or(RepositoryError::NotFound(Entity::Member))
    }

    async fn delete_member(&self, id: i32) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.members.remove(&id).is_none() {
            return Err(RepositoryError::NotFound(Entity::Member));
        }
        state.links.retain(|link| link.member_id != id);
        Ok(())
    }

    async fn purge_members(&self) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().await;
        let count = state.members.len();
        state.members.clear();
        state.links.clear();
        Ok(count)
    }

    async fn create_member_with_selections(
        &self,
        submission: Submission,
    ) -> Result<Member, RepositoryError> {
        let mut state = self.state.lock().await;
        let directory = state.directory().to_directory();
        let limit = state.limit(self.fallback_limit);
        let accepted = validate_submission(&directory, limit, submission)?;

        let member = Member {
            id: state.next_id(),
            full_name: accepted.member.full_name,
            phone: accepted.member.phone,
            email: accepted.member.email,
            address: accepted.member.address,
            created_at: Utc::now(),
        };
        state.members.insert(member.id, member.clone());
        state.link(member.id, &accepted.departments);

        info!(
            member = member.id,
            departments = accepted.departments.len(),
            "stored submission"
        );
        Ok(member)
    }

    async fn update_member(
        &self,
        id: i32,
        update: MemberUpdate,
    ) -> Result<MemberWithDepartments, RepositoryError> {
        let mut state = self.state.lock().await;
        let mut member = state
            .members
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(Entity::Member))?;

        member.apply(&update)?;
        if let Some(selected) = &update.selected_departments {
            let directory = state.directory().to_directory();
            validate_selection(&directory, state.limit(self.fallback_limit), selected)?;
            state.links.retain(|link| link.member_id != id);
            state.link(id, selected);
        }
        state.members.insert(id, member.clone());

        state
            .with_departments(vec![member])
            .pop()
            .ok_or(RepositoryError::NotFound(Entity::Member))
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.state.lock().await.settings.get(key).cloned())
    }

    async fn list_settings(&self) -> Result<BTreeMap<String, String>, RepositoryError> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        validate_setting(key, value)?;
        self.state
            .lock()
            .await
            .settings
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn seed(&self) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.settings.is_empty() {
            return Ok(false);
        }
        for (key, value) in seed::SETTINGS {
            state.settings.insert((*key).to_owned(), (*value).to_owned());
        }
        for category in seed::CATEGORIES {
            let id = state.insert_category(category.name, 1).id;
            for department in category.departments {
                state.insert_department(department, Some(id));
            }
        }
        for department in seed::UNCATEGORIZED {
            state.insert_department(department, None);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use department_selection_engine::{MemberDetails, SelectionLimit, ValidationError};

    use super::*;

    fn limit(value: u32) -> GlobalLimit {
        GlobalLimit::new(value).unwrap()
    }

    fn submission(selected: &[i32]) -> Submission {
        Submission {
            member: MemberDetails {
                full_name: "Ada Obi".to_owned(),
                phone: "0801 234-5678".to_owned(),
                email: String::new(),
                address: "12 Church Road".to_owned(),
            },
            selected_departments: selected.iter().copied().map(DepartmentId).collect(),
        }
    }

    /// Music (pick one of Choir, Praise Team) and uncategorized Ushering.
    async fn music(repository: &MemoryRepository) -> (Category, [Department; 3]) {
        let music = repository
            .create_category(CategoryChange {
                name: "Music".to_owned(),
                max_selections: SelectionLimit::ONE,
            })
            .await
            .unwrap();
        let department = |name: &str, category: Option<CategoryId>| DepartmentChange {
            name: name.to_owned(),
            category_id: category,
        };
        let choir = repository
            .create_department(department("Choir", Some(CategoryId(music.id))))
            .await
            .unwrap();
        let praise = repository
            .create_department(department("PraiseTeam", Some(CategoryId(music.id))))
            .await
            .unwrap();
        let ushering = repository
            .create_department(department("Ushering", None))
            .await
            .unwrap();
        (music, [choir, praise, ushering])
    }

    #[tokio::test]
    async fn stores_member_and_links() {
        let repository = MemoryRepository::new(limit(2));
        let (_, [choir, _, ushering]) = music(&repository).await;

        let member = repository
            .create_member_with_selections(submission(&[choir.id, ushering.id]))
            .await
            .unwrap();

        let stored = repository.get_member(member.id).await.unwrap();
        assert_eq!(stored.department_ids(), vec![choir.id, ushering.id]);
    }

    #[tokio::test]
    async fn rejected_submission_writes_nothing() {
        let repository = MemoryRepository::new(limit(2));
        let (_, [choir, praise, _]) = music(&repository).await;

        let result = repository
            .create_member_with_selections(submission(&[choir.id, praise.id]))
            .await;
        assert!(matches!(
            result,
            Err(RepositoryError::Rejected(
                ValidationError::CategoryLimitExceeded { .. }
            ))
        ));
        assert!(repository.list_members().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_limit_wins_over_fallback() {
        let repository = MemoryRepository::new(limit(3));
        let (_, [choir, _, ushering]) = music(&repository).await;
        repository
            .put_setting(GlobalLimit::SETTING_KEY, "1")
            .await
            .unwrap();

        let result = repository
            .create_member_with_selections(submission(&[choir.id, ushering.id]))
            .await;
        assert!(matches!(
            result,
            Err(RepositoryError::Rejected(
                ValidationError::TooManySelections { selected: 2, .. }
            ))
        ));
        assert_eq!(repository.global_limit(limit(3)).await.unwrap(), limit(1));
    }

    #[tokio::test]
    async fn deleting_category_detaches_departments() {
        let repository = MemoryRepository::new(limit(2));
        let (music, [choir, praise, _]) = music(&repository).await;

        repository
            .delete_category(CategoryId(music.id))
            .await
            .unwrap();

        let uncategorized: Vec<i32> = repository
            .list_uncategorized_departments()
            .await
            .unwrap()
            .into_iter()
            .map(|department| department.id)
            .collect();
        assert!(uncategorized.contains(&choir.id));
        assert!(uncategorized.contains(&praise.id));
        assert!(repository.list_categories().await.unwrap().is_empty());

        // both former Music departments may now be chosen together
        repository
            .create_member_with_selections(submission(&[choir.id, praise.id]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleting_department_removes_its_selections() {
        let repository = MemoryRepository::new(limit(2));
        let (_, [choir, _, ushering]) = music(&repository).await;
        let member = repository
            .create_member_with_selections(submission(&[choir.id, ushering.id]))
            .await
            .unwrap();

        repository
            .delete_department(DepartmentId(choir.id))
            .await
            .unwrap();

        let stored = repository.get_member(member.id).await.unwrap();
        assert_eq!(stored.department_ids(), vec![ushering.id]);
    }

    #[tokio::test]
    async fn rejects_department_in_missing_category() {
        let repository = MemoryRepository::new(limit(2));
        let result = repository
            .create_department(DepartmentChange {
                name: "Nursery".to_owned(),
                category_id: Some(CategoryId(99)),
            })
            .await;
        assert!(matches!(
            result,
            Err(RepositoryError::UnknownCategory(CategoryId(99)))
        ));
    }

    #[tokio::test]
    async fn update_replaces_selection() {
        let repository = MemoryRepository::new(limit(2));
        let (_, [choir, praise, ushering]) = music(&repository).await;
        let member = repository
            .create_member_with_selections(submission(&[choir.id, ushering.id]))
            .await
            .unwrap();

        let updated = repository
            .update_member(
                member.id,
                MemberUpdate {
                    email: Some("ada@example.org".to_owned()),
                    selected_departments: Some(vec![DepartmentId(praise.id)]),
                    ..MemberUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.member.email, "ada@example.org");
        assert_eq!(updated.department_ids(), vec![praise.id]);

        let rejected = repository
            .update_member(
                member.id,
                MemberUpdate {
                    full_name: Some("Someone Else".to_owned()),
                    selected_departments: Some(vec![
                        DepartmentId(choir.id),
                        DepartmentId(praise.id),
                    ]),
                    ..MemberUpdate::default()
                },
            )
            .await;
        assert!(rejected.is_err());
        let stored = repository.get_member(member.id).await.unwrap();
        assert_eq!(stored.member.full_name, "Ada Obi");
        assert_eq!(stored.department_ids(), vec![praise.id]);
    }

    #[tokio::test]
    async fn finds_member_by_normalized_phone() {
        let repository = MemoryRepository::new(limit(2));
        let (_, [_, _, ushering]) = music(&repository).await;
        let member = repository
            .create_member_with_selections(submission(&[ushering.id]))
            .await
            .unwrap();

        assert_eq!(
            repository
                .find_member_by_phone("08012345678")
                .await
                .unwrap()
                .id,
            member.id
        );
        assert!(matches!(
            repository.find_member_by_phone("999").await,
            Err(RepositoryError::NotFound(Entity::Member))
        ));
    }

    #[tokio::test]
    async fn report_data_matches_listings() {
        let repository = MemoryRepository::new(limit(2));
        let (_, [choir, _, ushering]) = music(&repository).await;
        repository
            .create_member_with_selections(submission(&[choir.id, ushering.id]))
            .await
            .unwrap();

        let data = repository.report_data().await.unwrap();
        assert_eq!(data.departments, repository.list_departments().await.unwrap());
        assert_eq!(data.members, repository.list_members().await.unwrap());
        assert_eq!(data.members[0].department_ids(), vec![choir.id, ushering.id]);
    }

    #[tokio::test]
    async fn seeds_once() {
        let repository = MemoryRepository::new(limit(2));
        assert!(repository.seed().await.unwrap());
        assert!(!repository.seed().await.unwrap());

        let directory = repository.directory().await.unwrap();
        assert_eq!(directory.categories.len(), 3);
        assert_eq!(directory.uncategorized.len(), 3);
        assert_eq!(
            repository.get_setting(GlobalLimit::SETTING_KEY).await.unwrap(),
            Some("3".to_owned())
        );
    }

    #[tokio::test]
    async fn purge_counts_members() {
        let repository = MemoryRepository::new(limit(2));
        let (_, [choir, _, ushering]) = music(&repository).await;
        for selected in [&[choir.id][..], &[ushering.id][..]] {
            repository
                .create_member_with_selections(submission(selected))
                .await
                .unwrap();
        }
        assert_eq!(repository.purge_members().await.unwrap(), 2);
        assert!(repository.list_members().await.unwrap().is_empty());
    }
}
