use std::io::Write;

use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::config::Config;
use crate::contributions::{self, ContributionReport};
use crate::error::{Error, Result};
use crate::filter::Predicate;
use crate::models::{
    ContributionRecord, ExportRecord, Project, ProjectInput, Task, TaskCategory, TaskInput,
    TaskPriority, TaskStatus, User, UserInput,
};

/// Database connection pool
pub struct Database {
    pool: PgPool,
    export_chunk_size: i64,
}

/// Pagination metadata for a task listing page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub pagination: Pagination,
}

/// Headline counters for the dashboard.
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_projects: i64,
    pub active_tasks: i64,
    pub completed_tasks: i64,
    pub team_members: i64,
}

impl Database {
    /// Create a new Database instance with a connection pool
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(config.database_url())
            .await?;

        Ok(Self {
            pool,
            export_chunk_size: config.export_chunk_size,
        })
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    // Task queries

    /// Paginated task listing in the canonical urgency order: priority
    /// rank, then status rank, then category rank, then end date
    /// descending. Soft-deleted tasks never appear. A page past the end
    /// returns an empty list with correct metadata.
    pub async fn list_tasks(
        &self,
        predicates: &[Predicate],
        page: i64,
        limit: i64,
    ) -> Result<TaskPage> {
        if limit <= 0 {
            return Err(Error::validation("limit", "must be positive"));
        }
        if page <= 0 {
            return Err(Error::validation("page", "must be positive"));
        }

        let mut count_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM tasks t WHERE t.active = TRUE");
        push_predicates(&mut count_query, predicates);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT t.* FROM tasks t WHERE t.active = TRUE");
        push_predicates(&mut query, predicates);
        query.push(" ORDER BY ");
        query.push(urgency_order());
        query.push(" LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind((page - 1) * limit);

        let tasks: Vec<Task> = query.build_query_as().fetch_all(&self.pool).await?;
        tracing::debug!(total, page, returned = tasks.len(), "task listing served");

        Ok(TaskPage {
            tasks,
            pagination: Pagination {
                total,
                page,
                limit,
                total_pages: total_pages(total, limit),
            },
        })
    }

    /// One export chunk: up to `chunk_size` records at `offset`, newest
    /// first, enriched with project and assignee names via LEFT JOIN so
    /// dangling references still export. An empty result terminates the
    /// caller's loop.
    pub async fn export_chunk(
        &self,
        predicates: &[Predicate],
        chunk_size: i64,
        offset: i64,
    ) -> Result<Vec<ExportRecord>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT t.id, t.title, t.issue_link, p.title AS project_name, \
             u.name AS assigned_to_name, t.status, t.priority, t.category, \
             t.start_date, t.end_date, t.contribution_score, t.created_at \
             FROM tasks t \
             LEFT JOIN projects p ON t.project_id = p.id \
             LEFT JOIN users u ON t.assigned_to_id = u.id \
             WHERE t.active = TRUE",
        );
        push_predicates(&mut query, predicates);
        query.push(" ORDER BY t.created_at DESC LIMIT ");
        query.push_bind(chunk_size);
        query.push(" OFFSET ");
        query.push_bind(offset);

        Ok(query.build_query_as().fetch_all(&self.pool).await?)
    }

    /// Stream every task matching `predicates` into an xlsx workbook on
    /// `out`, fetching in chunks of the configured `export_chunk_size`.
    /// Each chunk is flushed downstream before the next fetch; a write
    /// failure (client gone) stops the loop without further queries.
    /// Returns the data row count.
    pub async fn export_tasks<W: Write>(&self, predicates: &[Predicate], out: W) -> Result<u64> {
        let chunk_size = self.export_chunk_size;
        crate::export::stream_tasks(out, |offset| {
            self.export_chunk(predicates, chunk_size, offset)
        })
        .await
    }

    /// Join-enriched task rows for the contribution aggregator.
    pub async fn contribution_records(
        &self,
        predicates: &[Predicate],
    ) -> Result<Vec<ContributionRecord>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT t.id, t.title, t.project_id, p.title AS project_title, \
             p.difficulty_multiplier AS project_difficulty, t.assigned_to_id, \
             u.name AS user_name, u.role AS user_role, t.start_date, t.end_date, \
             t.contribution_score, t.category \
             FROM tasks t \
             LEFT JOIN projects p ON t.project_id = p.id \
             LEFT JOIN users u ON t.assigned_to_id = u.id \
             WHERE t.active = TRUE",
        );
        push_predicates(&mut query, predicates);

        Ok(query.build_query_as().fetch_all(&self.pool).await?)
    }

    /// Fetch, aggregate, and roll up contributions for the filtered set.
    pub async fn contribution_report(
        &self,
        predicates: &[Predicate],
    ) -> Result<ContributionReport> {
        let records = self.contribution_records(predicates).await?;
        Ok(contributions::aggregate(&records))
    }

    // Task operations

    pub async fn get_task(&self, id: i32) -> Result<Task> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 AND active = TRUE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound { entity: "task", id })
    }

    pub async fn create_task(&self, input: &TaskInput) -> Result<Task> {
        input.validate()?;
        self.ensure_project_exists(input.project_id).await?;

        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (title, issue_link, project_id, assigned_to_id, status, \
             priority, category, start_date, end_date, contribution_score, active, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE, NOW(), NOW()) \
             RETURNING *",
        )
        .bind(&input.title)
        .bind(&input.issue_link)
        .bind(input.project_id)
        .bind(input.assigned_to_id)
        .bind(input.status)
        .bind(input.priority)
        .bind(input.category)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.score())
        .fetch_one(&self.pool)
        .await?;

        Ok(task)
    }

    pub async fn update_task(&self, id: i32, input: &TaskInput) -> Result<Task> {
        input.validate()?;
        self.ensure_project_exists(input.project_id).await?;

        sqlx::query_as::<_, Task>(
            "UPDATE tasks \
             SET title = $1, issue_link = $2, project_id = $3, assigned_to_id = $4, \
             status = $5, priority = $6, category = $7, start_date = $8, end_date = $9, \
             contribution_score = $10, updated_at = NOW() \
             WHERE id = $11 AND active = TRUE \
             RETURNING *",
        )
        .bind(&input.title)
        .bind(&input.issue_link)
        .bind(input.project_id)
        .bind(input.assigned_to_id)
        .bind(input.status)
        .bind(input.priority)
        .bind(input.category)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.score())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound { entity: "task", id })
    }

    /// Soft delete: the row is kept for history, flagged inactive, and
    /// disappears from every listing, aggregation, and export.
    pub async fn delete_task(&self, id: i32) -> Result<()> {
        let result =
            sqlx::query("UPDATE tasks SET active = FALSE, updated_at = NOW() WHERE id = $1 AND active = TRUE")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound { entity: "task", id });
        }
        Ok(())
    }

    async fn ensure_project_exists(&self, project_id: i32) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(Error::NotFound {
                entity: "project",
                id: project_id,
            });
        }
        Ok(())
    }

    // User operations

    /// Active users by default; `include_inactive` opts into the full
    /// history.
    pub async fn get_users(&self, include_inactive: bool) -> Result<Vec<User>> {
        let sql = if include_inactive {
            "SELECT * FROM users ORDER BY name ASC"
        } else {
            "SELECT * FROM users WHERE active = TRUE ORDER BY name ASC"
        };
        Ok(sqlx::query_as::<_, User>(sql).fetch_all(&self.pool).await?)
    }

    pub async fn get_user(&self, id: i32) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound { entity: "user", id })
    }

    pub async fn create_user(&self, input: &UserInput) -> Result<User> {
        input.validate()?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (name, role, active, created_at, updated_at) \
             VALUES ($1, $2, TRUE, NOW(), NOW()) RETURNING *",
        )
        .bind(&input.name)
        .bind(input.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn update_user(&self, id: i32, input: &UserInput) -> Result<User> {
        input.validate()?;

        sqlx::query_as::<_, User>(
            "UPDATE users SET name = $1, role = $2, updated_at = NOW() WHERE id = $3 RETURNING *",
        )
        .bind(&input.name)
        .bind(input.role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound { entity: "user", id })
    }

    /// Soft delete, preserving historical task assignments.
    pub async fn deactivate_user(&self, id: i32) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET active = FALSE, updated_at = NOW() WHERE id = $1 AND active = TRUE")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound { entity: "user", id });
        }
        Ok(())
    }

    // Project operations

    pub async fn get_projects(&self) -> Result<Vec<Project>> {
        Ok(
            sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY title ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn get_project(&self, id: i32) -> Result<Project> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound {
                entity: "project",
                id,
            })
    }

    pub async fn create_project(&self, input: &ProjectInput) -> Result<Project> {
        input.validate()?;

        let project = sqlx::query_as::<_, Project>(
            "INSERT INTO projects (title, description, logo, difficulty_multiplier, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING *",
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.logo)
        .bind(input.multiplier())
        .fetch_one(&self.pool)
        .await?;

        Ok(project)
    }

    pub async fn update_project(&self, id: i32, input: &ProjectInput) -> Result<Project> {
        input.validate()?;

        sqlx::query_as::<_, Project>(
            "UPDATE projects SET title = $1, description = $2, logo = $3, \
             difficulty_multiplier = $4, updated_at = NOW() WHERE id = $5 RETURNING *",
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.logo)
        .bind(input.multiplier())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound {
            entity: "project",
            id,
        })
    }

    /// Hard delete, guarded: rejected while any task (active or not)
    /// still references the project. Count and delete run in one
    /// transaction so the guard cannot race a concurrent insert.
    pub async fn delete_project(&self, id: i32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE project_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if count > 0 {
            return Err(Error::ProjectInUse { id, count });
        }

        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                entity: "project",
                id,
            });
        }

        tx.commit().await?;
        Ok(())
    }

    // Dashboard

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            "SELECT \
             (SELECT COUNT(*) FROM projects) AS total_projects, \
             (SELECT COUNT(*) FROM tasks WHERE status IN ('developing', 'testing') \
              AND active = TRUE) AS active_tasks, \
             (SELECT COUNT(*) FROM tasks WHERE status = 'online' AND active = TRUE) \
              AS completed_tasks, \
             (SELECT COUNT(*) FROM users WHERE active = TRUE) AS team_members",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}

/// Initialize the database connection pool
pub async fn init(config: &Config) -> Result<Database> {
    Database::new(config).await
}

pub(crate) fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

/// Translate the typed predicate set into SQL, AND-ed onto a WHERE
/// clause that already holds at least one condition (`t.active = TRUE`).
fn push_predicates(query: &mut QueryBuilder<'_, Postgres>, predicates: &[Predicate]) {
    for predicate in predicates {
        query.push(" AND ");
        match predicate {
            Predicate::AssignedTo(ids) => push_in_ids(query, "t.assigned_to_id", ids),
            Predicate::Project(ids) => push_in_ids(query, "t.project_id", ids),
            Predicate::Status(values) => {
                push_in_strs(query, "t.status", values.iter().map(TaskStatus::as_str))
            }
            Predicate::Priority(values) => {
                push_in_strs(query, "t.priority", values.iter().map(TaskPriority::as_str))
            }
            Predicate::Category(values) => {
                push_in_strs(query, "t.category", values.iter().map(TaskCategory::as_str))
            }
            Predicate::DateRange { start, end } => match (start, end) {
                (Some(start), Some(end)) => {
                    query.push("((t.start_date >= ");
                    query.push_bind(*start);
                    query.push(" AND t.start_date <= ");
                    query.push_bind(*end);
                    query.push(") OR (t.end_date >= ");
                    query.push_bind(*start);
                    query.push(" AND t.end_date <= ");
                    query.push_bind(*end);
                    query.push("))");
                }
                (Some(start), None) => {
                    query.push("(t.start_date >= ");
                    query.push_bind(*start);
                    query.push(" OR t.end_date >= ");
                    query.push_bind(*start);
                    query.push(")");
                }
                (None, Some(end)) => {
                    query.push("(t.start_date <= ");
                    query.push_bind(*end);
                    query.push(" OR t.end_date <= ");
                    query.push_bind(*end);
                    query.push(")");
                }
                (None, None) => {
                    query.push("TRUE");
                }
            },
        }
    }
}

fn push_in_ids(query: &mut QueryBuilder<'_, Postgres>, column: &str, ids: &[i32]) {
    query.push(column);
    query.push(" IN (");
    {
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
    }
    query.push(")");
}

fn push_in_strs<'a>(
    query: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    values: impl Iterator<Item = &'a str>,
) {
    query.push(column);
    query.push(" IN (");
    {
        let mut separated = query.separated(", ");
        for value in values {
            separated.push_bind(value.to_string());
        }
    }
    query.push(")");
}

/// ORDER BY expression surfacing the most urgent, most active work
/// first, tie-broken by recency.
fn urgency_order() -> String {
    let mut sql = String::from("CASE t.priority");
    for p in TaskPriority::ALL {
        sql.push_str(&format!(" WHEN '{}' THEN {}", p.as_str(), p.rank()));
    }
    sql.push_str(" ELSE 4 END, CASE t.status");
    for s in TaskStatus::ALL {
        sql.push_str(&format!(" WHEN '{}' THEN {}", s.as_str(), s.rank()));
    }
    sql.push_str(" ELSE 7 END, CASE t.category");
    for c in TaskCategory::ALL {
        sql.push_str(&format!(" WHEN '{}' THEN {}", c.as_str(), c.rank()));
    }
    sql.push_str(" ELSE 5 END, t.end_date DESC");
    sql
}
