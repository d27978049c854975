//! New-purchase form with a live installment simulation.

use crate::mutations::{Api, CreatePurchase};
use crate::queries;
use abono_core::validation::PurchaseForm;
use abono_core::{ApiResult, Customer, CustomerListParams, InstallmentSimulation, Page, Purchase};
use abono_sync::{MutationDispatcher, QueryBinder, QueryView};

/// Purchase entry screen.
///
/// The simulation query is rebound on every form edit. It stays disabled
/// until installments are switched on with a positive total and count, and
/// since its identity is the pair of numbers, going back to an earlier
/// combination reuses the cached result.
pub struct InstallmentPlanner {
    dispatcher: MutationDispatcher<Api>,
    form: PurchaseForm,
    customers: QueryBinder<Page<Customer>>,
    simulation: QueryBinder<InstallmentSimulation>,
}

impl InstallmentPlanner {
    pub fn open(dispatcher: MutationDispatcher<Api>) -> Self {
        let store = dispatcher.store().clone();
        let api = dispatcher.context().clone();
        let form = PurchaseForm::default();
        Self {
            customers: QueryBinder::mount(
                store.clone(),
                queries::customers(&api, CustomerListParams::default()),
            ),
            simulation: QueryBinder::mount(
                store,
                queries::installment_simulation(&api, form.simulation_request()),
            ),
            dispatcher,
            form,
        }
    }

    pub fn form(&self) -> &PurchaseForm {
        &self.form
    }

    /// Apply an edit to the form and rebind the simulation.
    pub fn edit(&mut self, apply: impl FnOnce(&mut PurchaseForm)) {
        apply(&mut self.form);
        let spec = queries::installment_simulation(
            self.dispatcher.context(),
            self.form.simulation_request(),
        );
        self.simulation.set_query(spec);
    }

    /// Customers offered in the selector.
    pub fn customers(&self) -> QueryView<Page<Customer>> {
        self.customers.view()
    }

    pub fn simulation(&self) -> QueryView<InstallmentSimulation> {
        self.simulation.view()
    }

    pub fn is_simulating(&self) -> bool {
        self.simulation.is_enabled()
    }

    pub async fn settled(&mut self) -> QueryView<InstallmentSimulation> {
        self.customers.settled().await;
        self.simulation.settled().await
    }

    /// Validate and create the purchase.
    pub async fn submit(&self) -> ApiResult<Purchase> {
        let mutation = CreatePurchase::from_form(&self.form)?;
        self.dispatcher.mutate(mutation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abono_sync::CacheStore;
    use abono_test_utils::assertions::assert_validation_error;
    use abono_test_utils::{fixtures, Endpoint, InMemoryConsole};
    use std::sync::Arc;

    fn planner(console: &Arc<InMemoryConsole>) -> InstallmentPlanner {
        let api: Arc<Api> = console.clone();
        InstallmentPlanner::open(MutationDispatcher::new(api, CacheStore::default()))
    }

    #[tokio::test]
    async fn simulation_waits_for_usable_input() {
        let console = Arc::new(fixtures::seeded_console());
        let mut planner = planner(&console);
        let view = planner.settled().await;
        assert!(view.is_idle());

        planner.edit(|form| {
            form.installment_enabled = true;
            form.total_amount = "300".to_string();
        });
        assert!(!planner.is_simulating());

        planner.edit(|form| form.installment_count = "3".to_string());
        let view = planner.settled().await;
        assert_eq!(view.data().map(|s| s.installment_amount), Some(100.0));
        assert_eq!(console.calls(Endpoint::SimulateInstallments), 1);
    }

    #[tokio::test]
    async fn returning_to_earlier_inputs_hits_the_cache() {
        let console = Arc::new(fixtures::seeded_console());
        let mut planner = planner(&console);
        for count in ["3", "4", "3"] {
            planner.edit(|form| {
                form.installment_enabled = true;
                form.total_amount = "300".to_string();
                form.installment_count = count.to_string();
            });
            planner.settled().await;
        }
        assert_eq!(planner.simulation().data().map(|s| s.installment_count), Some(3));
        assert_eq!(console.calls(Endpoint::SimulateInstallments), 2);
    }

    #[tokio::test]
    async fn submit_validates_then_creates() {
        let console = Arc::new(fixtures::seeded_console());
        let mut planner = planner(&console);
        planner.settled().await;

        let result = planner.submit().await;
        assert_validation_error(&result, "customerId");
        assert_eq!(console.calls(Endpoint::CreatePurchase), 0);

        planner.edit(|form| {
            form.customer_id = "2".to_string();
            form.description = "Ropero".to_string();
            form.total_amount = "120".to_string();
        });
        let purchase = planner.submit().await.unwrap();
        assert_eq!(purchase.remaining_amount, 120.0);
        assert_eq!(purchase.customer_name, "María López");
    }
}
