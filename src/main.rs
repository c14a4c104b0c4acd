mod cmdline;
mod driver;

use karst_utils::KarstResult;

fn main() -> KarstResult<()> {
    driver::run()
}
