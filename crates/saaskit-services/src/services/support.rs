//! Support tickets and the FAQ knowledge base.

use super::{filters, touch};
use chrono::Utc;
use saaskit_core::constants::tables;
use saaskit_core::models::{
    CreateFaqRequest, CreateTicketRequest, FaqEntry, FaqSearchResult, SupportTicket,
    TicketStatus, UpdateFaqRequest, UpdateTicketRequest,
};
use saaskit_core::AppError;
use saaskit_db::{from_row, from_rows, to_row, DatabaseProvider};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

const WHOLE_QUERY_IN_QUESTION: u32 = 10;
const WHOLE_QUERY_IN_ANSWER: u32 = 5;
const TERM_IN_QUESTION: u32 = 3;
const TERM_IN_ANSWER: u32 = 1;

/// Keyword relevance of one FAQ entry for a lower-cased, trimmed query
fn relevance(entry: &FaqEntry, query: &str, terms: &[&str]) -> u32 {
    let question = entry.question.to_lowercase();
    let answer = entry.answer.to_lowercase();

    let mut score = 0;
    if question.contains(query) {
        score += WHOLE_QUERY_IN_QUESTION;
    }
    if answer.contains(query) {
        score += WHOLE_QUERY_IN_ANSWER;
    }
    for term in terms {
        if question.contains(term) {
            score += TERM_IN_QUESTION;
        }
        if answer.contains(term) {
            score += TERM_IN_ANSWER;
        }
    }
    score
}

/// Rank entries for `query`. A blank query returns every entry with relevance 1.
pub fn rank_faqs(entries: Vec<FaqEntry>, query: &str) -> Vec<FaqSearchResult> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return entries
            .into_iter()
            .map(|entry| FaqSearchResult { entry, relevance: 1 })
            .collect();
    }

    let terms: Vec<&str> = query.split_whitespace().collect();
    let mut results: Vec<FaqSearchResult> = entries
        .into_iter()
        .map(|entry| {
            let relevance = relevance(&entry, &query, &terms);
            FaqSearchResult { entry, relevance }
        })
        .filter(|r| r.relevance > 0)
        .collect();

    // sort_by is stable, ties keep storage order
    results.sort_by(|a, b| b.relevance.cmp(&a.relevance));
    results
}

#[derive(Clone)]
pub struct SupportService {
    db: Arc<dyn DatabaseProvider>,
}

impl SupportService {
    pub fn new(db: Arc<dyn DatabaseProvider>) -> Self {
        Self { db }
    }

    pub async fn get_all_tickets(&self) -> Result<Vec<SupportTicket>, AppError> {
        from_rows(
            self.db
                .query(tables::SUPPORT_TICKETS, &Default::default())
                .await?,
        )
    }

    pub async fn get_user_tickets(&self, user_id: Uuid) -> Result<Vec<SupportTicket>, AppError> {
        from_rows(
            self.db
                .query(tables::SUPPORT_TICKETS, &filters([("user_id", json!(user_id))]))
                .await?,
        )
    }

    pub async fn get_ticket_by_id(&self, id: Uuid) -> Result<Option<SupportTicket>, AppError> {
        self.db
            .get_by_id(tables::SUPPORT_TICKETS, &id.to_string())
            .await?
            .map(from_row)
            .transpose()
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn create_ticket(
        &self,
        user_id: Uuid,
        request: CreateTicketRequest,
    ) -> Result<SupportTicket, AppError> {
        let row = self
            .db
            .insert(
                tables::SUPPORT_TICKETS,
                json!({
                    "user_id": user_id,
                    "subject": request.subject,
                    "message": request.message,
                    "status": TicketStatus::Open,
                }),
            )
            .await?;
        from_row(row)
    }

    /// Apply an update. A response sent without a status moves the ticket to
    /// `in_progress` and stamps `responded_at`.
    #[tracing::instrument(skip(self, request))]
    pub async fn update_ticket(
        &self,
        id: Uuid,
        request: UpdateTicketRequest,
    ) -> Result<SupportTicket, AppError> {
        let responding = request.status.is_none()
            && request.response.as_deref().is_some_and(|r| !r.is_empty());

        let mut row = to_row(&request)?;
        if let (true, Value::Object(map)) = (responding, &mut row) {
            map.insert("status".to_string(), json!(TicketStatus::InProgress));
            map.insert("responded_at".to_string(), json!(Utc::now()));
        }
        touch(&mut row);

        let row = self
            .db
            .update(tables::SUPPORT_TICKETS, &id.to_string(), row)
            .await?;
        from_row(row)
    }

    pub async fn delete_ticket(&self, id: Uuid) -> Result<(), AppError> {
        self.db.delete(tables::SUPPORT_TICKETS, &id.to_string()).await
    }

    /// Every FAQ ordered by category, then `order_index`
    pub async fn get_all_faqs(&self) -> Result<Vec<FaqEntry>, AppError> {
        let mut faqs: Vec<FaqEntry> = from_rows(
            self.db
                .query(tables::FAQ_ENTRIES, &Default::default())
                .await?,
        )?;
        faqs.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(a.order_index.cmp(&b.order_index))
        });
        Ok(faqs)
    }

    pub async fn get_faqs_by_category(&self, category: &str) -> Result<Vec<FaqEntry>, AppError> {
        let mut faqs: Vec<FaqEntry> = from_rows(
            self.db
                .query(tables::FAQ_ENTRIES, &filters([("category", json!(category))]))
                .await?,
        )?;
        faqs.sort_by_key(|f| f.order_index);
        Ok(faqs)
    }

    pub async fn get_faq_by_id(&self, id: Uuid) -> Result<Option<FaqEntry>, AppError> {
        self.db
            .get_by_id(tables::FAQ_ENTRIES, &id.to_string())
            .await?
            .map(from_row)
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    pub async fn search_faqs(&self, query: &str) -> Result<Vec<FaqSearchResult>, AppError> {
        let faqs: Vec<FaqEntry> = from_rows(
            self.db
                .query(tables::FAQ_ENTRIES, &Default::default())
                .await?,
        )?;
        let results = rank_faqs(faqs, query);
        tracing::debug!(matches = results.len(), "FAQ search completed");
        Ok(results)
    }

    pub async fn create_faq(
        &self,
        request: CreateFaqRequest,
        created_by: Option<Uuid>,
    ) -> Result<FaqEntry, AppError> {
        let row = self
            .db
            .insert(
                tables::FAQ_ENTRIES,
                json!({
                    "question": request.question,
                    "answer": request.answer,
                    "category": request.category,
                    "order_index": request.order_index.unwrap_or(0),
                    "created_by": created_by,
                }),
            )
            .await?;
        from_row(row)
    }

    pub async fn update_faq(&self, id: Uuid, request: UpdateFaqRequest) -> Result<FaqEntry, AppError> {
        let mut row = to_row(&request)?;
        touch(&mut row);
        let row = self
            .db
            .update(tables::FAQ_ENTRIES, &id.to_string(), row)
            .await?;
        from_row(row)
    }

    pub async fn delete_faq(&self, id: Uuid) -> Result<(), AppError> {
        self.db.delete(tables::FAQ_ENTRIES, &id.to_string()).await
    }

    /// Distinct categories in ascending order
    pub async fn get_faq_categories(&self) -> Result<Vec<String>, AppError> {
        let faqs: Vec<FaqEntry> = from_rows(
            self.db
                .query(tables::FAQ_ENTRIES, &Default::default())
                .await?,
        )?;
        Ok(faqs
            .into_iter()
            .map(|f| f.category)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }
}
