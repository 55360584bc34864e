pub mod contracts;
pub mod salaries;
pub mod users;

pub use contracts::ContractService;
pub use salaries::SalaryService;
pub use users::UserService;
