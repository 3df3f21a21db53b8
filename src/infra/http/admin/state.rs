use std::sync::Arc;

use crate::application::{admin::AdminService, listings::ListingService};
use crate::cache::TagCache;

#[derive(Clone)]
pub struct AdminState {
    pub admin: Arc<AdminService>,
    pub listings: Arc<ListingService>,
    pub cache: Arc<TagCache>,
}
