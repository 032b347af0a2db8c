use rocket::Route;

mod ballots;
mod postcode;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(ballots::routes());
    routes.extend(postcode::routes());
    routes
}
