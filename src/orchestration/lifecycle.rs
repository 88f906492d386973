//! Order and compliance request state transitions.
//!
//! Every transition follows the same order: local checks (payment plan,
//! participation, role gate on applied orders), cache invalidation, the
//! backend mutation and finally the notification to the other party. A
//! rejected transition never reaches the backend.

use std::sync::Arc;

use validator::Validate;

use super::fanout::FanOut;
use crate::{
    auth,
    backend::{NotificationsClient, OffersClient, OrdersClient},
    cache::Caches,
    core::{GatewayError, GatewayResult},
    model::{
        validation_message, ComplianceRequest, EmailMessage, Identity, Notification, Order,
        OrderBasics,
    },
};

const AREA: &str = "orders";

/// Offer status once an order has been opened for it.
const OFFER_PENDING: &str = "PENDING";

pub struct OrderLifecycleController {
    orders: OrdersClient,
    offers: OffersClient,
    notifications: NotificationsClient,
    caches: Arc<Caches>,
}

impl OrderLifecycleController {
    pub fn new(
        orders: OrdersClient,
        offers: OffersClient,
        notifications: NotificationsClient,
        caches: Arc<Caches>,
    ) -> Self {
        Self {
            orders,
            offers,
            notifications,
            caches,
        }
    }

    /// Open an order on an offer and invite the applicant.
    pub async fn create(&self, identity: &Identity, mut order: Order) -> GatewayResult<()> {
        validate_order(&order)?;
        auth::validate_ownership(identity, order.order_basics.customer_id)?;

        let basics = order.order_basics.clone();
        let offer = self
            .offers
            .get_offer_details(basics.offer_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    GatewayError::NotFound("offer not found".to_string())
                } else {
                    e.into()
                }
            })?;
        order.order_details.title = offer.offer_details.title;
        order.order_details.body = offer.offer_details.description;

        self.caches
            .filtered_orders_list
            .delete(basics.customer_id)
            .await?;
        self.caches.offers.delete(basics.offer_id).await?;

        let offer_id = basics.offer_id;
        let orders = self.orders.clone();
        let offers = self.offers.clone();
        FanOut::new("create order")
            .task("create order", async move {
                orders.create_order(&order).await.map_err(GatewayError::from)
            })
            .task("change offer status", async move {
                offers
                    .change_offer_status(offer_id, OFFER_PENDING)
                    .await
                    .map_err(GatewayError::from)
            })
            .join()
            .await?;

        log::info!(
            "order for offer {} opened by {} for applicant {}",
            basics.offer_id,
            basics.customer_id,
            basics.applicant_id
        );

        let notifications = self.notifications.clone();
        let mailer = self.notifications.clone();
        let invitation = Notification::new(
            basics.applicant_id,
            AREA,
            "New Order Invitation",
            format!("You have been invited to an order for offer #{}", basics.offer_id),
        );
        let confirmation = EmailMessage {
            email: identity.email.clone(),
            subject: "Order created".to_string(),
            body: format!(
                "Your order for offer #{} has been sent to the applicant",
                basics.offer_id
            ),
        };
        FanOut::new("create order")
            .task("create notification", async move {
                notifications
                    .create_notification(&invitation)
                    .await
                    .map_err(GatewayError::from)
            })
            .task("send email", async move {
                mailer.send_email(&confirmation).await.map_err(GatewayError::from)
            })
            .join()
            .await?;
        Ok(())
    }

    pub async fn update(&self, identity: &Identity, order: Order) -> GatewayResult<()> {
        validate_order(&order)?;
        let basics = &order.order_basics;
        ensure_participant(identity, basics)?;
        self.ensure_mutable(identity, basics.order_id, "update").await?;

        self.invalidate_order(basics).await?;
        self.orders.update_order(&order).await?;

        self.notify(
            basics.applicant_id,
            "Order Updated!",
            format!("Order #{} has been updated", basics.order_id),
        )
        .await
    }

    /// The backend only deletes orders owned by `identity`.
    pub async fn delete(&self, identity: &Identity, order_id: u64) -> GatewayResult<()> {
        self.ensure_mutable(identity, order_id, "delete").await?;

        if let Some(order) = self.caches.orders.get(order_id).await? {
            self.invalidate_order(&order.order_basics).await?;
        } else {
            self.caches.orders.delete(order_id).await?;
        }
        self.caches
            .filtered_orders_list
            .delete(identity.customer_id)
            .await?;
        self.orders
            .delete_order(order_id, identity.customer_id)
            .await?;
        Ok(())
    }

    /// The applicant accepts the invitation.
    pub async fn apply(&self, identity: &Identity, basics: OrderBasics) -> GatewayResult<()> {
        ensure_participant(identity, &basics)?;

        self.invalidate_order(&basics).await?;
        self.orders.apply_to_order(&basics).await?;

        self.notify(
            basics.customer_id,
            "New Application",
            format!("Your order #{} has been accepted", basics.order_id),
        )
        .await
    }

    pub async fn reject(&self, identity: &Identity, basics: OrderBasics) -> GatewayResult<()> {
        ensure_participant(identity, &basics)?;

        self.invalidate_order(&basics).await?;
        self.orders.reject_order(&basics).await?;

        self.notify(
            basics.applicant_id,
            "Order Rejected",
            format!("Order #{} has been rejected", basics.order_id),
        )
        .await
    }

    /// The applicant claims a payment round as done.
    pub async fn create_compliance(
        &self,
        identity: &Identity,
        request: ComplianceRequest,
    ) -> GatewayResult<()> {
        let basics = &request.order_basics;
        ensure_participant(identity, basics)?;

        self.invalidate_compliance_lists(basics).await?;
        self.orders.create_compliance_request(&request).await?;

        self.notify(
            basics.customer_id,
            "New Compliance Request",
            format!(
                "A compliance request for round {} of order #{} is waiting for you",
                request.round, basics.order_id
            ),
        )
        .await
    }

    /// Settle a round. An order that is already paid is never settled twice.
    pub async fn approve_compliance(
        &self,
        identity: &Identity,
        mut request: ComplianceRequest,
    ) -> GatewayResult<()> {
        let order_id = request.order_basics.order_id;
        ensure_participant(identity, &request.order_basics)?;

        let order = match self.caches.orders.get(order_id).await? {
            Some(order) => order,
            None => self.orders.get_order_details(order_id).await?,
        };
        // the stored order decides who may settle it and who hears about it
        ensure_participant(identity, &order.order_basics)?;
        if order.payment_details.is_paid {
            return Err(GatewayError::Validation("order is already paid".to_string()));
        }
        request.order_basics = order.order_basics.clone();
        let basics = &order.order_basics;

        self.caches.orders.delete(basics.order_id).await?;
        self.invalidate_compliance_lists(basics).await?;
        self.orders.approve_compliance(&request).await?;

        self.notify(
            basics.applicant_id,
            "Compliance Request Approved",
            format!(
                "Round {} of order #{} has been approved",
                request.round, basics.order_id
            ),
        )
        .await?;

        if request.round == order.payment_details.round_amount {
            log::info!("last round of order {} approved", basics.order_id);
            self.notify(
                basics.applicant_id,
                "Order Completed",
                format!("All rounds of order #{} are approved", basics.order_id),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn reject_compliance(
        &self,
        identity: &Identity,
        request: ComplianceRequest,
    ) -> GatewayResult<()> {
        let basics = &request.order_basics;
        ensure_participant(identity, basics)?;

        self.invalidate_compliance_lists(basics).await?;
        self.orders.reject_compliance(&request).await?;

        self.notify(
            basics.applicant_id,
            "Compliance Request Rejected",
            format!(
                "Round {} of order #{} has been rejected",
                request.round, basics.order_id
            ),
        )
        .await
    }

    /// Applied orders only change hands through an elevated role.
    async fn ensure_mutable(
        &self,
        identity: &Identity,
        order_id: u64,
        action: &str,
    ) -> GatewayResult<()> {
        let status = self.orders.get_order_status(order_id).await?;
        if status.requires_elevation() && !identity.is_elevated() {
            log::warn!(
                "customer {} tried to {action} applied order {order_id}",
                identity.customer_id
            );
            return Err(GatewayError::Forbidden(format!(
                "forbidden: you are not allowed to {action} this order because it is applied"
            )));
        }
        Ok(())
    }

    async fn invalidate_order(&self, basics: &OrderBasics) -> GatewayResult<()> {
        self.caches.orders.delete(basics.order_id).await?;
        self.caches.orders_list.delete(basics.applicant_id).await?;
        self.caches
            .filtered_orders_list
            .delete(basics.customer_id)
            .await
    }

    async fn invalidate_compliance_lists(&self, basics: &OrderBasics) -> GatewayResult<()> {
        self.caches
            .compliance_requests_list
            .delete(basics.customer_id)
            .await?;
        self.caches
            .compliance_requests_list
            .delete(basics.applicant_id)
            .await
    }

    async fn notify(&self, customer_id: u64, title: &str, body: String) -> GatewayResult<()> {
        let notification = Notification::new(customer_id, AREA, title, body);
        self.notifications
            .create_notification(&notification)
            .await
            .map_err(|e| {
                log::error!("failed to notify customer {customer_id} ({title}): {e}");
                e.into()
            })
    }
}

fn validate_order(order: &Order) -> GatewayResult<()> {
    order
        .validate()
        .map_err(|e| GatewayError::Validation(validation_message(&e)))
}

fn ensure_participant(identity: &Identity, basics: &OrderBasics) -> GatewayResult<()> {
    if identity.is_elevated() || basics.is_participant(identity.customer_id) {
        Ok(())
    } else {
        Err(GatewayError::Forbidden(
            "forbidden: not allowed to access this resource".to_string(),
        ))
    }
}
