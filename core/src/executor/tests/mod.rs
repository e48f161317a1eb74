mod helpers;

mod scope_tests;
