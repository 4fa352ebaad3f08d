//! Budget operations.

use cartwise_core::{Budget, BudgetPatch, NewBudget, OperationKind};
use chrono::Utc;

use super::payload::{PatchPayload, TargetPayload, encode};
use super::{Mutation, Store, WriteOutcome, encode_record};
use crate::engine::Collection;
use crate::notifier::{ChangeAction, ChangeTopic};

impl Store {
    /// Every budget, by name.
    pub async fn budgets(&self) -> Vec<Budget> {
        let mut budgets: Vec<Budget> = self.read_all(Collection::Budgets).await;
        budgets.sort_by(|a, b| a.name.cmp(&b.name));
        budgets
    }

    /// A budget by id.
    pub async fn budget(&self, id: &str) -> Option<Budget> {
        self.read_one(Collection::Budgets, id).await
    }

    /// Creates a budget.
    pub async fn create_budget(&self, input: NewBudget) -> WriteOutcome<Budget> {
        let budget = match Budget::create(&input, Utc::now()) {
            Ok(budget) => budget,
            Err(e) => return WriteOutcome::Failed(e.into()),
        };
        let value = match encode_record(&budget) {
            Ok(value) => value,
            Err(e) => return WriteOutcome::Failed(e),
        };

        match self
            .write(
                Collection::Budgets,
                &budget.id,
                Mutation::Put(&value),
                OperationKind::CreateBudget,
                value.clone(),
            )
            .await
        {
            Ok(written) => {
                self.emit(ChangeTopic::Budgets, ChangeAction::Create, &budget);
                written.outcome(budget)
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }

    /// Merges `patch` into a budget.
    pub async fn update_budget(&self, id: &str, patch: BudgetPatch) -> WriteOutcome<Budget> {
        let mut budget = match self.lookup::<Budget>(Collection::Budgets, id).await {
            Ok(Some(budget)) => budget,
            Ok(None) => return WriteOutcome::NotFound,
            Err(e) => return WriteOutcome::Failed(e),
        };
        if let Err(e) = budget.apply(&patch, Utc::now()) {
            return WriteOutcome::Failed(e.into());
        }
        let (value, payload) = match (
            encode_record(&budget),
            encode(&PatchPayload {
                id: id.to_string(),
                patch,
            }),
        ) {
            (Ok(value), Ok(payload)) => (value, payload),
            (Err(e), _) | (_, Err(e)) => return WriteOutcome::Failed(e),
        };

        match self
            .write(
                Collection::Budgets,
                id,
                Mutation::Put(&value),
                OperationKind::UpdateBudget,
                payload,
            )
            .await
        {
            Ok(written) => {
                self.emit(ChangeTopic::Budgets, ChangeAction::Update, &budget);
                written.outcome(budget)
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }

    /// Removes a budget permanently.
    pub async fn delete_budget(&self, id: &str) -> WriteOutcome<Budget> {
        let budget = match self.lookup::<Budget>(Collection::Budgets, id).await {
            Ok(Some(budget)) => budget,
            Ok(None) => return WriteOutcome::NotFound,
            Err(e) => return WriteOutcome::Failed(e),
        };
        let payload = match encode(&TargetPayload { id: id.to_string() }) {
            Ok(payload) => payload,
            Err(e) => return WriteOutcome::Failed(e),
        };

        match self
            .write(
                Collection::Budgets,
                id,
                Mutation::Remove,
                OperationKind::DeleteBudget,
                payload,
            )
            .await
        {
            Ok(written) => {
                self.emit(ChangeTopic::Budgets, ChangeAction::Delete, &budget);
                written.outcome(budget)
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }
}
