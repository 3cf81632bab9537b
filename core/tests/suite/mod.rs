mod subscriptions;
mod view_model;
