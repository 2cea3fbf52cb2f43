use super::{
    config,
    models::{Note, NoteDraft},
    store::{NoteStore, StoreError},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, query, query_as, PgPool};
use uuid::Uuid;

pub async fn create_pg_pool(db_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config::PG_MAX_CONNECTIONS)
        .connect(db_url)
        .await
        .context("pool to be able to connect")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("migrations to apply")?;

    Ok(pool)
}

/// Notes in postgres. The `user_id = $n` clause on every statement is what
/// keeps people out of each other's notes.
#[derive(Clone, Debug)]
pub struct PgNoteStore {
    db: PgPool,
}

impl PgNoteStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NoteStore for PgNoteStore {
    async fn insert(
        &self,
        user_id: Uuid,
        draft: &NoteDraft,
    ) -> Result<Note, StoreError> {
        let note = query_as::<_, Note>(
            "insert into notes (id, user_id, title, content)
            values ($1, $2, $3, $4)
            returning id, user_id, title, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .fetch_one(&self.db)
        .await?;

        Ok(note)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Note, StoreError> {
        query_as::<_, Note>(
            "select id, user_id, title, content, created_at from notes
            where id = $1 and user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Note>, StoreError> {
        let notes = query_as::<_, Note>(
            "select id, user_id, title, content, created_at from notes
            where user_id = $1
            order by created_at desc",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(notes)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        draft: &NoteDraft,
    ) -> Result<(), StoreError> {
        let res = query(
            "
            update notes
            set
                title = $1,
                content = $2
            where id = $3 and user_id = $4
            ",
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if res.rows_affected() == 0 {
            Err(StoreError::NotFound(id))
        } else {
            Ok(())
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let res = query("delete from notes where id = $1 and user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if res.rows_affected() == 0 {
            Err(StoreError::NotFound(id))
        } else {
            Ok(())
        }
    }
}
