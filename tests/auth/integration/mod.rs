mod test_login_flow;
mod test_managed_flow;
mod test_middleware;
mod test_provider_client;
