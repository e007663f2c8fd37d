mod test_role_hierarchy;
mod test_token_properties;
