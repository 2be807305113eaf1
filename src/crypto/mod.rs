pub mod cipher;
pub mod password;
pub mod random;

pub use cipher::{CipherError, PasswordCipher};
pub use password::PasswordHasher;
pub use random::{new_access_password, otp_code, random_int, random_string, RandomSource};
