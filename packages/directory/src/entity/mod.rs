pub mod employee_record;
