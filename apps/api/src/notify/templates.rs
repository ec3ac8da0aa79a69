// Plain-text bodies for every mail the service sends.

use super::Email;
use crate::models::job::Job;
use crate::models::review::Review;
use crate::models::user::User;

pub fn welcome(user: &User) -> Email {
    Email {
        to: user.email.clone(),
        subject: "Welcome to Career Dock".to_string(),
        body: format!(
            "Hi {},\n\nYour Career Dock account is ready. Start tracking your \
             applications and interview rounds from your dashboard.\n\nGood luck!\n",
            user.first_name
        ),
    }
}

pub fn job_created(to: &str, job: &Job) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Application tracked: {} at {}", job.jobtitle, job.company),
        body: format!(
            "You added a new application.\n\nRole: {}\nCompany: {}\nType: {}\nApplied: {}\n",
            job.jobtitle, job.company, job.jobtype, job.date_applied
        ),
    }
}

pub fn review_created(to: &str, review: &Review) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Your review of {} is live", review.company),
        body: format!(
            "Thanks for sharing your experience as {} at {}.\nRating: {:.1}/5\n",
            review.role, review.company, review.rating
        ),
    }
}

pub fn otp(to: &str, code: &str, ttl_minutes: i64) -> Email {
    Email {
        to: to.to_string(),
        subject: "Your Career Dock password reset code".to_string(),
        body: format!(
            "Your one-time code is {code}. It expires in {ttl_minutes} minutes.\n\
             If you did not request a password reset you can ignore this e-mail.\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_mail_contains_code() {
        let mail = otp("e@x.com", "004217", 5);
        assert_eq!(mail.to, "e@x.com");
        assert!(mail.body.contains("004217"));
        assert!(mail.body.contains("5 minutes"));
    }
}
