use crate::domain::recipient_resolver::{Recipient, RecipientResolver};
use crate::domain::records::Teacher;
use async_trait::async_trait;

/// Teachers loaded from the teacher CSV, looked up by section.
#[derive(Debug, Clone)]
pub struct CsvTeacherDirectory {
    teachers: Vec<Teacher>,
}

impl CsvTeacherDirectory {
    pub fn new(teachers: Vec<Teacher>) -> Self {
        Self { teachers }
    }

    pub fn len(&self) -> usize {
        self.teachers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teachers.is_empty()
    }
}

#[async_trait]
impl RecipientResolver for CsvTeacherDirectory {
    async fn resolve(&self, section: &str) -> Result<Option<Recipient>, anyhow::Error> {
        let section = section.to_lowercase();
        Ok(self
            .teachers
            .iter()
            .find(|t| t.section == section)
            .map(|t| Recipient {
                name: t.name.clone(),
                email: t.email.clone(),
            }))
    }
}
