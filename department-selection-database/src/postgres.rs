use std::collections::BTreeMap;

use async_trait::async_trait;
use department_selection_engine::{
    normalize_phone, validate_selection, validate_submission, CategoryId, DepartmentId,
    Directory, GlobalLimit, Submission,
};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt as _;
use tracing::{info, warn};

use crate::models::{
    limit_to_column, Category, CategoryChange, Department, DepartmentChange, DepartmentDirectory,
    DepartmentWithCategory, Member, MemberDepartment, MemberUpdate, MemberWithDepartments,
    NewCategory, NewDepartment, NewMember, NewMemberDepartment, NewSetting, ReportData, Setting,
};
use crate::schema::{categories, departments, member_departments, members, settings};
use crate::{seed, validate_setting, Entity, Pool, Repository, RepositoryError};

/// A [`Repository`] backed by PostgreSQL.
///
/// Submissions and member updates run in a repeatable read transaction so
/// the directory they are validated against cannot change before the links
/// are written.
#[derive(Clone)]
pub struct PgRepository {
    pool: Pool,
    fallback_limit: GlobalLimit,
}

impl PgRepository {
    #[must_use]
    pub const fn new(pool: Pool, fallback_limit: GlobalLimit) -> Self {
        Self {
            pool,
            fallback_limit,
        }
    }
}

async fn load_directory(conn: &mut AsyncPgConnection) -> QueryResult<DepartmentDirectory> {
    let categories = categories::table
        .select(Category::as_select())
        .load(conn)
        .await?;
    let departments = departments::table
        .select(Department::as_select())
        .load(conn)
        .await?;
    Ok(DepartmentDirectory::assemble(categories, departments))
}

async fn load_departments(
    conn: &mut AsyncPgConnection,
) -> QueryResult<Vec<DepartmentWithCategory>> {
    let departments = departments::table
        .select(Department::as_select())
        .load(conn)
        .await?;
    let categories = categories::table
        .select(Category::as_select())
        .load(conn)
        .await?;
    Ok(DepartmentWithCategory::resolve_all(
        &departments,
        &categories,
    ))
}

async fn load_newest_members(
    conn: &mut AsyncPgConnection,
) -> QueryResult<Vec<MemberWithDepartments>> {
    let members = members::table
        .order((members::created_at.desc(), members::id.desc()))
        .select(Member::as_select())
        .load(conn)
        .await?;
    with_departments(conn, members).await
}

async fn load_limit(
    conn: &mut AsyncPgConnection,
    fallback: GlobalLimit,
) -> QueryResult<GlobalLimit> {
    let value: Option<String> = settings::table
        .filter(settings::key.eq(GlobalLimit::SETTING_KEY))
        .select(settings::value)
        .first(conn)
        .await
        .optional()?;
    Ok(GlobalLimit::from_setting(value.as_deref(), fallback))
}

async fn check_category(
    conn: &mut AsyncPgConnection,
    category: Option<CategoryId>,
) -> Result<(), RepositoryError> {
    if let Some(id) = category {
        let found: i64 = categories::table
            .find(id.0)
            .count()
            .get_result(conn)
            .await?;
        if found == 0 {
            return Err(RepositoryError::UnknownCategory(id));
        }
    }
    Ok(())
}

async fn insert_links(
    conn: &mut AsyncPgConnection,
    member_id: i32,
    selected: &[DepartmentId],
) -> QueryResult<usize> {
    let links: Vec<NewMemberDepartment> = selected
        .iter()
        .map(|department| NewMemberDepartment {
            member_id,
            department_id: department.0,
        })
        .collect();
    diesel::insert_into(member_departments::table)
        .values(links)
        .execute(conn)
        .await
}

/// Validates against `directory` and inserts the member with its links. Must
/// run inside the transaction that read `directory`.
async fn store_submission(
    conn: &mut AsyncPgConnection,
    directory: &Directory,
    limit: GlobalLimit,
    submission: Submission,
) -> Result<Member, RepositoryError> {
    let accepted = validate_submission(directory, limit, submission)?;

    let member = diesel::insert_into(members::table)
        .values(NewMember {
            full_name: &accepted.member.full_name,
            phone: &accepted.member.phone,
            email: &accepted.member.email,
            address: &accepted.member.address,
        })
        .returning(Member::as_returning())
        .get_result(conn)
        .await?;
    let linked = insert_links(conn, member.id, &accepted.departments).await?;

    info!(member = member.id, departments = linked, "stored submission");
    Ok(member)
}

/// Resolves the departments of the given members, keeping their order.
async fn with_departments(
    conn: &mut AsyncPgConnection,
    members: Vec<Member>,
) -> QueryResult<Vec<MemberWithDepartments>> {
    let ids: Vec<i32> = members.iter().map(|member| member.id).collect();
    let links = member_departments::table
        .filter(member_departments::member_id.eq_any(ids))
        .select(MemberDepartment::as_select())
        .load(conn)
        .await?;
    let departments = departments::table
        .select(Department::as_select())
        .load(conn)
        .await?;
    let categories = categories::table
        .select(Category::as_select())
        .load(conn)
        .await?;
    Ok(MemberWithDepartments::assemble(
        members,
        links,
        &departments,
        &categories,
    ))
}

#[async_trait]
impl Repository for PgRepository {
    async fn directory(&self) -> Result<DepartmentDirectory, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        Ok(connection
            .build_transaction()
            .repeatable_read()
            .read_only()
            .run::<_, diesel::result::Error, _>(|conn| load_directory(conn).scope_boxed())
            .await?)
    }

    async fn create_category(&self, change: CategoryChange) -> Result<Category, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        Ok(diesel::insert_into(categories::table)
            .values(NewCategory {
                name: &change.name,
                max_selections: limit_to_column(change.max_selections),
            })
            .returning(Category::as_returning())
            .get_result(connection)
            .await?)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        change: CategoryChange,
    ) -> Result<Category, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        diesel::update(categories::table.find(id.0))
            .set((
                categories::name.eq(&change.name),
                categories::max_selections.eq(limit_to_column(change.max_selections)),
            ))
            .returning(Category::as_returning())
            .get_result(connection)
            .await
            .optional()?
            .ok_or(RepositoryError::NotFound(Entity::Category))
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .transaction::<_, RepositoryError, _>(|conn| {
                async move {
                    let detached = diesel::update(
                        departments::table.filter(departments::category_id.eq(id.0)),
                    )
                    .set(departments::category_id.eq(None::<i32>))
                    .execute(conn)
                    .await?;
                    let deleted = diesel::delete(categories::table.find(id.0))
                        .execute(conn)
                        .await?;
                    if deleted == 0 {
                        return Err(RepositoryError::NotFound(Entity::Category));
                    }
                    info!(category = id.0, detached, "deleted category");
                    Ok(())
                }
                .scope_boxed()
            })
            .await
    }

    async fn list_departments(&self) -> Result<Vec<DepartmentWithCategory>, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        Ok(connection
            .build_transaction()
            .repeatable_read()
            .read_only()
            .run::<_, diesel::result::Error, _>(|conn| load_departments(conn).scope_boxed())
            .await?)
    }

    async fn create_department(
        &self,
        change: DepartmentChange,
    ) -> Result<Department, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .transaction::<_, RepositoryError, _>(|conn| {
                async move {
                    check_category(conn, change.category_id).await?;
                    Ok(diesel::insert_into(departments::table)
                        .values(NewDepartment {
                            name: &change.name,
                            category_id: change.category_id.map(|id| id.0),
                        })
                        .returning(Department::as_returning())
                        .get_result(conn)
                        .await?)
                }
                .scope_boxed()
            })
            .await
    }

    async fn update_department(
        &self,
        id: DepartmentId,
        change: DepartmentChange,
    ) -> Result<Department, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .transaction::<_, RepositoryError, _>(|conn| {
                async move {
                    check_category(conn, change.category_id).await?;
                    diesel::update(departments::table.find(id.0))
                        .set((
                            departments::name.eq(&change.name),
                            departments::category_id.eq(change.category_id.map(|id| id.0)),
                        ))
                        .returning(Department::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?
                        .ok_or(RepositoryError::NotFound(Entity::Department))
                }
                .scope_boxed()
            })
            .await
    }

    async fn delete_department(&self, id: DepartmentId) -> Result<(), RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .transaction::<_, RepositoryError, _>(|conn| {
                async move {
                    diesel::delete(
                        member_departments::table
                            .filter(member_departments::department_id.eq(id.0)),
                    )
                    .execute(conn)
                    .await?;
                    let deleted = diesel::delete(departments::table.find(id.0))
                        .execute(conn)
                        .await?;
                    if deleted == 0 {
                        return Err(RepositoryError::NotFound(Entity::Department));
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await
    }

    async fn list_members(&self) -> Result<Vec<MemberWithDepartments>, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        Ok(connection
            .build_transaction()
            .repeatable_read()
            .read_only()
            .run::<_, diesel::result::Error, _>(|conn| load_newest_members(conn).scope_boxed())
            .await?)
    }

    async fn report_data(&self) -> Result<ReportData, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        Ok(connection
            .build_transaction()
            .repeatable_read()
            .read_only()
            .run::<_, diesel::result::Error, _>(|conn| {
                async move {
                    Ok(ReportData {
                        departments: load_departments(conn).await?,
                        members: load_newest_members(conn).await?,
                    })
                }
                .scope_boxed()
            })
            .await?)
    }

    async fn get_member(&self, id: i32) -> Result<MemberWithDepartments, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .transaction::<_, RepositoryError, _>(|conn| {
                async move {
                    let member = members::table
                        .find(id)
                        .select(Member::as_select())
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or(RepositoryError::NotFound(Entity::Member))?;
                    with_departments(conn, vec![member])
                        .await?
                        .pop()
                        .ok_or(RepositoryError::NotFound(Entity::Member))
                }
                .scope_boxed()
            })
            .await
    }

    async fn find_member_by_phone(&self, phone: &str) -> Result<Member, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        let exact = members::table
            .filter(members::phone.eq(phone))
            .order(members::id)
            .select(Member::as_select())
            .first(connection)
            .await
            .optional()?;
        if let Some(member) = exact {
            return Ok(member);
        }

        let normalized = normalize_phone(phone);
        let candidates = members::table
            .order(members::id)
            .select(Member::as_select())
            .load(connection)
            .await?;
        candidates
            .into_iter()
            .find(|member| normalize_phone(&member.phone) == normalized)
            .ok_or(RepositoryError::NotFound(Entity::Member))
    }

    async fn delete_member(&self, id: i32) -> Result<(), RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .transaction::<_, RepositoryError, _>(|conn| {
                async move {
                    diesel::delete(
                        member_departments::table.filter(member_departments::member_id.eq(id)),
                    )
                    .execute(conn)
                    .await?;
                    let deleted = diesel::delete(members::table.find(id)).execute(conn).await?;
                    if deleted == 0 {
                        return Err(RepositoryError::NotFound(Entity::Member));
                    }
                    Ok(())
                }
                .scope_boxed()
            })
            .await
    }

    async fn purge_members(&self) -> Result<usize, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        let deleted = connection
            .transaction::<_, RepositoryError, _>(|conn| {
                async move {
                    diesel::delete(member_departments::table)
                        .execute(conn)
                        .await?;
                    Ok(diesel::delete(members::table).execute(conn).await?)
                }
                .scope_boxed()
            })
            .await?;
        warn!(deleted, "purged all members");
        Ok(deleted)
    }

    async fn create_member_with_selections(
        &self,
        submission: Submission,
    ) -> Result<Member, RepositoryError> {
        let fallback = self.fallback_limit;
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .build_transaction()
            .repeatable_read()
            .run::<_, RepositoryError, _>(|conn| {
                async move {
                    let directory = load_directory(conn).await?.to_directory();
                    let limit = load_limit(conn, fallback).await?;
                    store_submission(conn, &directory, limit, submission).await
                }
                .scope_boxed()
            })
            .await
    }

    async fn update_member(
        &self,
        id: i32,
        update: MemberUpdate,
    ) -> Result<MemberWithDepartments, RepositoryError> {
        let fallback = self.fallback_limit;
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .build_transaction()
            .repeatable_read()
            .run::<_, RepositoryError, _>(|conn| {
                async move {
                    let mut member = members::table
                        .find(id)
                        .select(Member::as_select())
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or(RepositoryError::NotFound(Entity::Member))?;
                    member.apply(&update)?;

                    if let Some(selected) = &update.selected_departments {
                        let directory = load_directory(conn).await?.to_directory();
                        let limit = load_limit(conn, fallback).await?;
                        validate_selection(&directory, limit, selected)?;
                        diesel::delete(
                            member_departments::table
                                .filter(member_departments::member_id.eq(id)),
                        )
                        .execute(conn)
                        .await?;
                        insert_links(conn, id, selected).await?;
                    }

                    let member = diesel::update(members::table.find(id))
                        .set((
                            members::full_name.eq(&member.full_name),
                            members::email.eq(&member.email),
                            members::address.eq(&member.address),
                        ))
                        .returning(Member::as_returning())
                        .get_result(conn)
                        .await?;
                    with_departments(conn, vec![member])
                        .await?
                        .pop()
                        .ok_or(RepositoryError::NotFound(Entity::Member))
                }
                .scope_boxed()
            })
            .await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        Ok(settings::table
            .filter(settings::key.eq(key))
            .select(settings::value)
            .first(connection)
            .await
            .optional()?)
    }

    async fn list_settings(&self) -> Result<BTreeMap<String, String>, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        let settings = settings::table
            .select(Setting::as_select())
            .load(connection)
            .await?;
        Ok(settings
            .into_iter()
            .map(|setting| (setting.key, setting.value))
            .collect())
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        validate_setting(key, value)?;
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        diesel::insert_into(settings::table)
            .values(NewSetting { key, value })
            .on_conflict(settings::key)
            .do_update()
            .set(settings::value.eq(value))
            .execute(connection)
            .await?;
        Ok(())
    }

    async fn seed(&self) -> Result<bool, RepositoryError> {
        let mut pooled = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut pooled;
        connection
            .transaction::<_, RepositoryError, _>(|conn| {
                async move {
                    let existing: i64 = settings::table.count().get_result(conn).await?;
                    if existing > 0 {
                        return Ok(false);
                    }

                    let settings: Vec<NewSetting> = seed::SETTINGS
                        .iter()
                        .map(|(key, value)| NewSetting { key, value })
                        .collect();
                    diesel::insert_into(settings::table)
                        .values(settings)
                        .execute(conn)
                        .await?;

                    for category in seed::CATEGORIES {
                        let id: i32 = diesel::insert_into(categories::table)
                            .values(NewCategory {
                                name: category.name,
                                max_selections: 1,
                            })
                            .returning(categories::id)
                            .get_result(conn)
                            .await?;
                        let departments: Vec<NewDepartment> = category
                            .departments
                            .iter()
                            .map(|name| NewDepartment {
                                name,
                                category_id: Some(id),
                            })
                            .collect();
                        diesel::insert_into(departments::table)
                            .values(departments)
                            .execute(conn)
                            .await?;
                    }

                    let uncategorized: Vec<NewDepartment> = seed::UNCATEGORIZED
                        .iter()
                        .map(|name| NewDepartment {
                            name,
                            category_id: None,
                        })
                        .collect();
                    diesel::insert_into(departments::table)
                        .values(uncategorized)
                        .execute(conn)
                        .await?;

                    info!("seeded default directory and settings");
                    Ok(true)
                }
                .scope_boxed()
            })
            .await
    }
}
