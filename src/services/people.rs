//! Authors and readers directory

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        author::{Author, CreateAuthor},
        ids::{AuthorId, ReaderId},
        reader::{CreateReader, Reader},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct PeopleService {
    repository: Repository,
}

impl PeopleService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create_author(&self, request: CreateAuthor) -> AppResult<Author> {
        request.validate()?;
        let author = Author {
            id: AuthorId::new(),
            name: request.name.unwrap_or_default(),
        };
        self.repository.people.insert_author(&author).await?;
        tracing::info!("Created author {}", author.id);
        Ok(author)
    }

    pub async fn get_author(&self, id: AuthorId) -> AppResult<Author> {
        self.repository
            .people
            .get_author(id)
            .await?
            .ok_or_else(|| id.not_found())
    }

    pub async fn list_authors(&self) -> AppResult<Vec<Author>> {
        self.repository.people.list_authors().await
    }

    pub async fn create_reader(&self, request: CreateReader) -> AppResult<Reader> {
        request.validate()?;
        let reader = Reader {
            id: ReaderId::new(),
            name: request.name.unwrap_or_default(),
        };
        self.repository.people.insert_reader(&reader).await?;
        tracing::info!("Created reader {}", reader.id);
        Ok(reader)
    }

    pub async fn get_reader(&self, id: ReaderId) -> AppResult<Reader> {
        self.repository
            .people
            .get_reader(id)
            .await?
            .ok_or_else(|| id.not_found())
    }

    pub async fn list_readers(&self) -> AppResult<Vec<Reader>> {
        self.repository.people.list_readers().await
    }
}
