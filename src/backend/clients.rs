use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use super::{invoke, invoke_unit, BackendResult, RpcChannel};
use crate::model::{
    Applicant, ApplyToOfferRequest, AuthCustomer, ChangeEmailRequest, ChangePasswordRequest,
    ChangeTwoStepStatusRequest, ComplianceRequest, EmailMessage, Identity, Notification, Offer,
    Order, OrderBasics, OrderStatus, OrdersFilter, Post, PostReaction, Profile, ReportRequest,
    Review, ReviewComment, ReviewReaction, SignInRequest, SignUpRequest, Stats,
};

macro_rules! service_client {
    ($(#[$meta:meta])* $name:ident, $service:literal) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            channel: Arc<dyn RpcChannel>,
        }

        impl $name {
            pub const SERVICE: &'static str = $service;

            pub fn new(channel: Arc<dyn RpcChannel>) -> Self {
                Self { channel }
            }

            async fn call<Req, Resp>(&self, method: &str, request: &Req) -> BackendResult<Resp>
            where
                Req: Serialize + ?Sized,
                Resp: DeserializeOwned,
            {
                invoke(self.channel.as_ref(), Self::SERVICE, method, request).await
            }

            async fn send<Req>(&self, method: &str, request: &Req) -> BackendResult<()>
            where
                Req: Serialize + ?Sized,
            {
                invoke_unit(self.channel.as_ref(), Self::SERVICE, method, request).await
            }

            pub async fn health_check(&self) -> BackendResult<()> {
                self.send("HealthCheck", &json!({})).await
            }
        }
    };
}

service_client!(
    /// Identity and credential backend.
    AuthClient,
    "auth"
);
service_client!(ProfileClient, "profile");
service_client!(OrdersClient, "orders");
service_client!(OffersClient, "offers");
service_client!(ReviewsClient, "reviews");
service_client!(BlogClient, "blog");
service_client!(NotificationsClient, "notifications");

#[derive(Deserialize)]
struct StatusReply {
    status: OrderStatus,
}

#[derive(Deserialize)]
struct RelationReply {
    #[serde(default)]
    offer_id: u64,
}

impl AuthClient {
    pub async fn validate_token(&self, token: &str) -> BackendResult<Identity> {
        self.call("ValidateToken", &json!({ "token": token })).await
    }

    pub async fn get_customer(&self, email: &str) -> BackendResult<AuthCustomer> {
        self.call("GetCustomer", &json!({ "email": email })).await
    }

    /// Returns the session payload (tokens) untouched.
    pub async fn sign_in(&self, request: &SignInRequest) -> BackendResult<Value> {
        self.call("SignIn", request).await
    }
}

impl ProfileClient {
    pub async fn create_customer(&self, request: &SignUpRequest) -> BackendResult<()> {
        self.send("CreateCustomer", request).await
    }

    pub async fn get_profile(&self, customer_id: u64) -> BackendResult<Profile> {
        self.call("GetCustomerProfile", &json!({ "customer_id": customer_id }))
            .await
    }

    pub async fn get_public_profile(&self, customer_id: u64) -> BackendResult<Profile> {
        self.call("GetPublicProfile", &json!({ "customer_id": customer_id }))
            .await
    }

    pub async fn update_profile(&self, profile: &Profile) -> BackendResult<()> {
        self.send("UpdateCustomerProfile", profile).await
    }

    pub async fn fill_profile(&self, profile: &Profile) -> BackendResult<()> {
        self.send("FillProfile", profile).await
    }

    pub async fn report_customer(&self, request: &ReportRequest) -> BackendResult<()> {
        self.send("ReportCustomer", request).await
    }

    pub async fn change_two_step_status(
        &self,
        request: &ChangeTwoStepStatusRequest,
    ) -> BackendResult<()> {
        self.send("ChangeTwoStepStatus", request).await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> BackendResult<()> {
        self.send("ChangePassword", request).await
    }

    pub async fn change_email(&self, request: &ChangeEmailRequest) -> BackendResult<()> {
        self.send("ChangeCustomerEmail", request).await
    }
}

impl OrdersClient {
    pub async fn create_order(&self, order: &Order) -> BackendResult<()> {
        self.send("CreateOrder", order).await
    }

    pub async fn update_order(&self, order: &Order) -> BackendResult<()> {
        self.send("UpdateOrder", order).await
    }

    pub async fn get_order_status(&self, order_id: u64) -> BackendResult<OrderStatus> {
        let reply: StatusReply = self
            .call("GetOrderStatus", &json!({ "order_id": order_id }))
            .await?;
        Ok(reply.status)
    }

    pub async fn get_order_details(&self, order_id: u64) -> BackendResult<Order> {
        self.call("GetOrderDetails", &json!({ "order_id": order_id }))
            .await
    }

    pub async fn delete_order(&self, order_id: u64, customer_id: u64) -> BackendResult<()> {
        self.send(
            "DeleteOrder",
            &json!({ "order_id": order_id, "customer_id": customer_id }),
        )
        .await
    }

    pub async fn get_orders_by_filter(&self, filter: &OrdersFilter) -> BackendResult<Vec<Order>> {
        self.call("GetOrdersListByFilter", filter).await
    }

    pub async fn get_order_requests(
        &self,
        applicant_id: u64,
        skip: u64,
    ) -> BackendResult<Vec<Order>> {
        self.call(
            "GetOrderRequestsByApplicant",
            &json!({ "applicant_id": applicant_id, "skip": skip }),
        )
        .await
    }

    pub async fn apply_to_order(&self, basics: &OrderBasics) -> BackendResult<()> {
        self.send("ApplyToTheOrder", basics).await
    }

    pub async fn reject_order(&self, basics: &OrderBasics) -> BackendResult<()> {
        self.send("RejectAnOrder", basics).await
    }

    pub async fn create_compliance_request(
        &self,
        request: &ComplianceRequest,
    ) -> BackendResult<()> {
        self.send("CreateComplianceRequest", request).await
    }

    pub async fn approve_compliance(&self, request: &ComplianceRequest) -> BackendResult<()> {
        self.send("ApproveCompliance", request).await
    }

    pub async fn reject_compliance(&self, request: &ComplianceRequest) -> BackendResult<()> {
        self.send("RejectCompliance", request).await
    }

    pub async fn get_compliance_requests(
        &self,
        customer_id: u64,
        skip: u64,
    ) -> BackendResult<Vec<ComplianceRequest>> {
        self.call(
            "GetComplianceRequestsList",
            &json!({ "customer_id": customer_id, "skip": skip }),
        )
        .await
    }

    pub async fn get_customer_stats(&self, customer_id: u64) -> BackendResult<Stats> {
        self.call("GetCustomerStats", &json!({ "customer_id": customer_id }))
            .await
    }

    /// Offer id that links the two customers, `0` when they never worked together.
    pub async fn validate_customers_relation(
        &self,
        customer_id: u64,
        applicant_id: u64,
    ) -> BackendResult<u64> {
        let reply: RelationReply = self
            .call(
                "ValidateCustomersRelation",
                &json!({ "customer_id": customer_id, "applicant_id": applicant_id }),
            )
            .await?;
        Ok(reply.offer_id)
    }
}

impl OffersClient {
    pub async fn create_offer(&self, offer: &Offer) -> BackendResult<()> {
        self.send("CreateOffer", offer).await
    }

    pub async fn update_offer(&self, offer: &Offer) -> BackendResult<()> {
        self.send("UpdateOffer", offer).await
    }

    pub async fn get_offer_details(&self, offer_id: u64) -> BackendResult<Offer> {
        self.call("GetOfferDetails", &json!({ "offer_id": offer_id }))
            .await
    }

    pub async fn get_offers_list(&self, filter: &Value) -> BackendResult<Value> {
        self.call("GetOffersList", filter).await
    }

    pub async fn get_my_offers(&self, customer_id: u64, filter: &Value) -> BackendResult<Value> {
        self.call(
            "GetMyOffers",
            &json!({ "customer_id": customer_id, "filter": filter }),
        )
        .await
    }

    pub async fn delete_offer(&self, offer_id: u64, customer_id: u64) -> BackendResult<()> {
        self.send(
            "DeleteOffer",
            &json!({ "offer_id": offer_id, "customer_id": customer_id }),
        )
        .await
    }

    pub async fn apply_to_offer(&self, request: &ApplyToOfferRequest) -> BackendResult<()> {
        self.send("ApplyToTheOffer", request).await
    }

    pub async fn get_applicants(&self, offer_id: u64, skip: u64) -> BackendResult<Vec<Applicant>> {
        self.call(
            "GetApplicantsList",
            &json!({ "offer_id": offer_id, "skip": skip }),
        )
        .await
    }

    pub async fn change_offer_status(&self, offer_id: u64, status: &str) -> BackendResult<()> {
        self.send(
            "ChangeOfferStatus",
            &json!({ "offer_id": offer_id, "status": status }),
        )
        .await
    }
}

impl ReviewsClient {
    pub async fn create_review(&self, review: &Review) -> BackendResult<()> {
        self.send("CreateReview", review).await
    }

    pub async fn update_review(&self, review: &Review) -> BackendResult<()> {
        self.send("UpdateReview", review).await
    }

    pub async fn get_reviews(&self, customer_id: u64, skip: u64) -> BackendResult<Vec<Review>> {
        self.call(
            "GetReviewsList",
            &json!({ "customer_id": customer_id, "skip": skip }),
        )
        .await
    }

    pub async fn delete_review(&self, review_id: u64, customer_id: u64) -> BackendResult<()> {
        self.send(
            "DeleteReview",
            &json!({ "review_id": review_id, "customer_id": customer_id }),
        )
        .await
    }

    pub async fn add_comment(&self, comment: &ReviewComment) -> BackendResult<()> {
        self.send("AddReviewComment", comment).await
    }

    pub async fn get_comments(
        &self,
        review_id: u64,
        skip: u64,
    ) -> BackendResult<Vec<ReviewComment>> {
        self.call(
            "GetReviewCommentsList",
            &json!({ "review_id": review_id, "skip": skip }),
        )
        .await
    }

    pub async fn set_reaction(&self, reaction: &ReviewReaction) -> BackendResult<()> {
        self.send("SetReviewReaction", reaction).await
    }

    pub async fn get_customer_stats(&self, customer_id: u64) -> BackendResult<Stats> {
        self.call("GetCustomerStats", &json!({ "customer_id": customer_id }))
            .await
    }
}

impl BlogClient {
    pub async fn create_post(&self, post: &Post) -> BackendResult<()> {
        self.send("CreatePost", post).await
    }

    pub async fn update_post(&self, post: &Post) -> BackendResult<()> {
        self.send("UpdatePost", post).await
    }

    pub async fn get_posts(&self, customer_id: u64, skip: u64) -> BackendResult<Vec<Post>> {
        self.call(
            "GetBlog",
            &json!({ "customer_id": customer_id, "skip": skip }),
        )
        .await
    }

    pub async fn delete_post(&self, post_id: u64, customer_id: u64) -> BackendResult<()> {
        self.send(
            "DeletePost",
            &json!({ "post_id": post_id, "customer_id": customer_id }),
        )
        .await
    }

    pub async fn set_reaction(&self, reaction: &PostReaction) -> BackendResult<()> {
        self.send("SetReaction", reaction).await
    }
}

impl NotificationsClient {
    pub async fn create_notification(&self, notification: &Notification) -> BackendResult<()> {
        self.send("CreateNotification", notification).await
    }

    pub async fn send_email(&self, message: &EmailMessage) -> BackendResult<()> {
        self.send("SendEmail", message).await
    }

    pub async fn get_notifications(
        &self,
        customer_id: u64,
        skip: u64,
    ) -> BackendResult<Vec<Notification>> {
        self.call(
            "GetNotificationsList",
            &json!({ "customer_id": customer_id, "skip": skip }),
        )
        .await
    }

    pub async fn delete_notification(
        &self,
        notification_id: u64,
        customer_id: u64,
    ) -> BackendResult<()> {
        self.send(
            "DeleteNotification",
            &json!({ "notification_id": notification_id, "customer_id": customer_id }),
        )
        .await
    }

    pub async fn clear_notifications(&self, customer_id: u64) -> BackendResult<()> {
        self.send(
            "ClearNotifications",
            &json!({ "customer_id": customer_id }),
        )
        .await
    }
}
