pub mod function_executor;
