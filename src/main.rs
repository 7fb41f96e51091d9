use std::error::Error;

use vocab_prep::Pipeline;

fn main() -> Result<(), Box<dyn Error>> {
    Pipeline::run()
}
