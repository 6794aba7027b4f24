//! Authors and readers repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        author::Author,
        ids::{AuthorId, ReaderId},
        reader::Reader,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeopleStore: Send + Sync {
    async fn insert_author(&self, author: &Author) -> AppResult<()>;
    async fn get_author(&self, id: AuthorId) -> AppResult<Option<Author>>;
    async fn list_authors(&self) -> AppResult<Vec<Author>>;

    async fn insert_reader(&self, reader: &Reader) -> AppResult<()>;
    async fn get_reader(&self, id: ReaderId) -> AppResult<Option<Reader>>;
    async fn list_readers(&self) -> AppResult<Vec<Reader>>;
}

#[derive(Clone)]
pub struct PgPeopleStore {
    pool: Pool<Postgres>,
}

impl PgPeopleStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PeopleStore for PgPeopleStore {
    async fn insert_author(&self, author: &Author) -> AppResult<()> {
        sqlx::query("INSERT INTO authors (id, name) VALUES ($1, $2)")
            .bind(author.id)
            .bind(&author.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_author(&self, id: AuthorId) -> AppResult<Option<Author>> {
        let author = sqlx::query_as::<_, Author>("SELECT id, name FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(author)
    }

    async fn list_authors(&self) -> AppResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>("SELECT id, name FROM authors ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(authors)
    }

    async fn insert_reader(&self, reader: &Reader) -> AppResult<()> {
        sqlx::query("INSERT INTO readers (id, name) VALUES ($1, $2)")
            .bind(reader.id)
            .bind(&reader.name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_reader(&self, id: ReaderId) -> AppResult<Option<Reader>> {
        let reader = sqlx::query_as::<_, Reader>("SELECT id, name FROM readers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reader)
    }

    async fn list_readers(&self) -> AppResult<Vec<Reader>> {
        let readers = sqlx::query_as::<_, Reader>("SELECT id, name FROM readers ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(readers)
    }
}
