use axum::{
    Router,
    extract::FromRef,
    routing::{delete, get, patch, post},
};
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::route::{auth::{change_password, delete_user, get_me, get_users, login_user, register_user, update_user, update_user_role}, booking::{cancel_booking, create_booking, delete_booking, get_all_bookings, get_own_bookings, submit_review, update_booking, update_booking_status}, levels::{create_level, delete_level, get_levels_by_lot, update_level}, lots::{create_lot, delete_lot, get_lots, update_lot}, slots::{check_slot_availability, create_slot, delete_slot, get_available_slots, get_bookings_by_slot, get_slot_by_id, get_slot_reviews, get_slots, update_slot, update_slot_status}, stats::{get_dashboard_stats, get_monthly_revenue}};
use crate::sweeper::run_overstay_sweep;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
    //auth
    .route("/auth/register", post(register_user))                       //sign up, role is always user
    .route("/auth/login", post(login_user))                             //login, token carries id and role
    .route("/users/me", get(get_me))                                    //own profile
    .route("/users", get(get_users))                                    //list users, admin only
    .route("/users/{id}", patch(update_user))                           //edit profile, owner or admin
    .route("/users/{id}", delete(delete_user))                          //delete user, admin only, refuses while bookings remain
    .route("/users/{id}/role", patch(update_user_role))                 //role change, admin only, never on self
    .route("/users/{id}/password", patch(change_password))              //change password, current password required
    //lots
    .route("/lots", post(create_lot))                                   //create lot, admin only
    .route("/lots", get(get_lots))                                      //list all lots
    .route("/lots/{id}", patch(update_lot))                             //update lot, admin only
    .route("/lots/{id}", delete(delete_lot))                            //delete lot, admin only, refuses while levels remain
    //levels
    .route("/levels", post(create_level))                               //add level, admin/moderator, unique name per lot
    .route("/lots/{id}/levels", get(get_levels_by_lot))                 //list levels of a lot
    .route("/levels/{id}", patch(update_level))                         //rename level, admin/moderator
    .route("/levels/{id}", delete(delete_level))                        //delete level, admin only, refuses while slots remain
    //slots
    .route("/slots", post(create_slot))                                 //add slot, admin/moderator, unique number per level
    .route("/slots", get(get_slots))                                    //list slots, optional level/status filter
    .route("/slots/available", get(get_available_slots))                //available slots for a date range, one batched query
    .route("/slots/{id}", get(get_slot_by_id))                          //get slot by id
    .route("/slots/{id}", patch(update_slot))                           //edit slot, admin/moderator, level move admin only
    .route("/slots/{id}", delete(delete_slot))                          //delete slot, admin may cascade bookings
    .route("/slots/{id}/status", patch(update_slot_status))             //administrative availability flip, admin/moderator
    .route("/slots/{id}/availability", get(check_slot_availability))    //availability for a date range
    .route("/slots/{id}/bookings", get(get_bookings_by_slot))           //bookings referencing a slot
    .route("/slots/{id}/reviews", get(get_slot_reviews))                //reviews with read-time average
    //bookings
    .route("/slots/{id}/bookings", post(create_booking))                //book a slot for a date range
    .route("/bookings", get(get_all_bookings))                          //staff see all, users see their own
    .route("/bookings/me", get(get_own_bookings))                       //own booking history
    .route("/bookings/{id}", patch(update_booking))                     //edit vehicle/dates, admin/moderator, dates re-checked
    .route("/bookings/{id}/status", patch(update_booking_status))       //status/exit/fine updates, admin/moderator
    .route("/bookings/{id}/cancel", patch(cancel_booking))              //cancel own booking
    .route("/bookings/{id}", delete(delete_booking))                    //delete booking, admin only
    .route("/bookings/{id}/review", post(submit_review))                //one-time review on a completed booking
    //stats
    .route("/stats/dashboard", get(get_dashboard_stats))                //dashboard counters and monthly revenue
    .route("/stats/monthly-revenue", get(get_monthly_revenue))          //revenue for a given month
    //admin
    .route("/admin/overstays/sweep", post(run_overstay_sweep))          //on-demand overstay sweep
    .with_state(state)
}
