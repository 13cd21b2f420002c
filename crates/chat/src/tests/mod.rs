mod secret_group_tests;
mod verlauf_tests;
